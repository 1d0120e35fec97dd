use std::sync::Arc;

use chrono::Utc;
use todoplus::app::App;
use todoplus::config::AppConfig;
use todoplus::core::notification::NotificationFilter;
use todoplus::core::preferences::Theme;
use todoplus::core::query::{PageRequest, SortDirection};
use todoplus::core::task::{Task, TaskSortField, TaskStatus};
use todoplus::core::user::Credentials;
use todoplus::ui::{LogPresentation, Notice, NoticeLevel, Notifier};

const USAGE: &str = "\
usage: todoplus <command> [args]

commands:
  login <username> <password>
  logout
  whoami
  tasks [--page N] [--status S]... [--search TEXT] [--sort FIELD] [--order asc|desc]
  stats
  notifications [--unread]
  theme [light|dark|auto]";

/// Prints notices to the terminal.
struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Error => eprintln!("error: {}", notice.message),
            NoticeLevel::Warning => eprintln!("warning: {}", notice.message),
            NoticeLevel::Info | NoticeLevel::Success => println!("{}", notice.message),
        }
    }
}

fn init_logging(config: &AppConfig) {
    // Logs go to the systemd user journal (`journalctl --user -t todoplus -f`).
    // Wrapper filters: todoplus crate at info/debug (per config), everything else at warn.
    struct FilteredJournal {
        inner: systemd_journal_logger::JournalLog,
    }

    impl log::Log for FilteredJournal {
        fn enabled(&self, metadata: &log::Metadata) -> bool {
            if metadata.target().starts_with("todoplus") {
                let max = if todoplus::debug_logging() { log::LevelFilter::Debug } else { log::LevelFilter::Info };
                metadata.level() <= max
            } else {
                metadata.level() <= log::LevelFilter::Warn
            }
        }
        fn log(&self, record: &log::Record) {
            if self.enabled(record.metadata()) {
                self.inner.log(record);
            }
        }
        fn flush(&self) {
            self.inner.flush();
        }
    }

    todoplus::set_debug_logging(config.debug_logging);

    let journal = match systemd_journal_logger::JournalLog::new() {
        Ok(journal) => journal.with_syslog_identifier("todoplus".to_string()),
        Err(e) => {
            eprintln!("warning: journal logging unavailable: {}", e);
            return;
        }
    };
    if let Err(e) = log::set_boxed_logger(Box::new(FilteredJournal { inner: journal })) {
        eprintln!("warning: logger already installed: {}", e);
        return;
    }
    // Global max must be Debug so todoplus debug logs can pass through when toggled
    log::set_max_level(log::LevelFilter::Debug);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    init_logging(&config);

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        println!("{}", USAGE);
        return Ok(());
    };
    let rest = &args[1..];

    let app = App::connect(config, Arc::new(ConsoleNotifier), Arc::new(LogPresentation))?;
    app.start(1280);

    match command.as_str() {
        "login" => {
            let [username, password] = rest else {
                return Err(USAGE.into());
            };
            if !app.session.login(&Credentials::new(username.as_str(), password.as_str())).await {
                return Err("login failed".into());
            }
        }
        "logout" => app.session.logout().await,
        "whoami" => {
            if !app.session.is_authenticated() {
                println!("not logged in");
            } else if app.session.refresh_user().await {
                println!("{} <{}>", app.session.user_name(), app.session.user_email());
            } else {
                return Err("session expired, please log in again".into());
            }
        }
        "tasks" => list_tasks(&app, rest).await?,
        "stats" => {
            if !app.tasks.fetch_page(PageRequest::default()).await {
                return Err("could not load tasks".into());
            }
            let stats = app.tasks.stats(Utc::now());
            println!(
                "{} tasks: {} pending, {} in progress, {} completed, {} overdue ({}% done)",
                stats.total, stats.pending, stats.in_progress, stats.completed, stats.overdue, stats.completion_rate
            );
        }
        "notifications" => {
            if rest.iter().any(|a| a == "--unread") {
                app.notifications.set_filters(|f: &mut NotificationFilter| f.is_read = Some(false));
            }
            if !app.notifications.fetch_page(PageRequest::default()).await {
                return Err("could not load notifications".into());
            }
            for n in app.notifications.view() {
                let marker = if n.is_read { ' ' } else { '*' };
                println!("{} {:>5}  {}  {}", marker, n.id, n.created_at, n.title);
            }
            println!("{} unread", app.notifications.fetch_unread_count().await);
        }
        "theme" => match rest.first() {
            Some(name) => {
                let theme = Theme::parse(name).ok_or_else(|| format!("unknown theme: {}", name))?;
                app.preferences.set_theme(theme);
            }
            None => println!("{} ({})", app.preferences.theme().as_str(), app.preferences.current_theme().as_str()),
        },
        other => return Err(format!("unknown command: {}\n{}", other, USAGE).into()),
    }

    Ok(())
}

async fn list_tasks(app: &App, args: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let mut request = PageRequest::<TaskSortField>::default();
    let mut sort_field = None;
    let mut direction = SortDirection::Desc;
    let mut statuses = Vec::new();
    let mut search = String::new();

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--page" => {
                let page = iter.next().ok_or("--page needs a value")?;
                request.page = Some(page.parse()?);
            }
            "--status" => {
                let raw = iter.next().ok_or("--status needs a value")?;
                statuses.push(TaskStatus::parse(raw).ok_or_else(|| format!("unknown status: {}", raw))?);
            }
            "--search" => {
                search = iter.next().ok_or("--search needs a value")?.clone();
            }
            "--sort" => {
                let raw = iter.next().ok_or("--sort needs a value")?;
                sort_field = Some(TaskSortField::parse(raw).ok_or_else(|| format!("unknown sort field: {}", raw))?);
            }
            "--order" => {
                let raw = iter.next().ok_or("--order needs a value")?;
                direction = SortDirection::parse(raw).ok_or_else(|| format!("unknown order: {}", raw))?;
            }
            other => return Err(format!("unknown option: {}", other).into()),
        }
    }

    app.tasks.set_filters(|f| {
        f.statuses = statuses;
        f.search = search;
    });
    if let Some(field) = sort_field {
        app.tasks.set_sort(field, direction);
        request = request.sorted_by(field, direction);
    }

    if !app.tasks.fetch_page(request).await {
        return Err("could not load tasks".into());
    }

    let now = Utc::now();
    for task in app.tasks.view() {
        print_task(&task, now);
    }
    let pagination = app.tasks.pagination();
    println!(
        "page {}/{} ({} tasks)",
        pagination.page(),
        pagination.total_pages(),
        pagination.total_items()
    );
    Ok(())
}

fn print_task(task: &Task, now: chrono::DateTime<Utc>) {
    let overdue = if task.is_overdue(now) { " OVERDUE" } else { "" };
    println!(
        "{:>5}  [{:<11}] {:<6}  {}{}",
        task.id,
        task.status.as_str(),
        task.priority.as_str(),
        task.title,
        overdue
    );
}
