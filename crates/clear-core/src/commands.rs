use std::io::{self, BufRead};

use anyhow::{Context, anyhow};
use chrono::Local;
use clear_shared::Credentials;
use tracing::{debug, info, instrument};

use crate::app::App;
use crate::cli::{
    AddArgs, CategoryCommand, Command, CredentialArgs, ListArgs, ModifyArgs, SettingsCommand,
    Switch, ThemeCommand,
};
use crate::datetime::parse_due_input;
use crate::render::Renderer;
use crate::task::{TaskDraft, TaskPatch};

const ID_PREFIX: &str = "id:";

#[instrument(skip(app, renderer))]
pub async fn dispatch(app: &mut App, renderer: &Renderer, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Command::Register(args) => cmd_register(app, args).await,
        Command::Login(args) => cmd_login(app, args).await,
        Command::Logout => {
            app.logout()?;
            println!("Logged out.");
            Ok(())
        }
        Command::Whoami => {
            match app.auth.user().filter(|_| app.auth.is_authenticated()) {
                Some(user) => println!("{} (id {})", user.username, user.id),
                None => println!("Not logged in."),
            }
            Ok(())
        }
        Command::Settings(SettingsCommand::LoginHint { state }) => {
            let enabled = state == Switch::On;
            app.settings
                .set_redirect_to_login(&mut app.storage, enabled)?;
            println!("Login hint {}.", if enabled { "on" } else { "off" });
            Ok(())
        }
        Command::Theme(cmd) => cmd_theme(app, renderer, cmd).await,
        other => {
            if !require_login(app)? {
                return Ok(());
            }
            dispatch_authenticated(app, renderer, other).await
        }
    }
}

async fn dispatch_authenticated(app: &mut App, renderer: &Renderer, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Stats => {
            let status = app.auth.stats(&app.api).await?;
            renderer.print_stats(&status)
        }
        Command::Passwd { old, new } => {
            app.auth.change_password(&app.api, &old, &new).await?;
            Ok(())
        }
        Command::List(args) => cmd_list(app, renderer, args).await,
        Command::Next => {
            ensure_page(app).await?;
            if !app.tasks.next_page(&app.api, app.auth.token()).await? {
                println!("Already on the last page.");
            }
            show_page(app, renderer)
        }
        Command::Prev => {
            ensure_page(app).await?;
            if !app.tasks.prev_page(&app.api, app.auth.token()).await? {
                println!("Already on the first page.");
            }
            show_page(app, renderer)
        }
        Command::Info { task } => {
            let id = resolve_task(app, &task).await?;
            let task = app
                .tasks
                .get(&id)
                .ok_or_else(|| anyhow!("task {id} is not on the current page"))?;
            renderer.print_task_info(task)
        }
        Command::Add(args) => cmd_add(app, renderer, args).await,
        Command::Modify(args) => cmd_modify(app, renderer, args).await,
        Command::Done { task } => cmd_complete(app, renderer, &task, true).await,
        Command::Undone { task } => cmd_complete(app, renderer, &task, false).await,
        Command::Toggle { task } => {
            let id = resolve_task(app, &task).await?;
            app.tasks
                .toggle_completion(&app.api, app.auth.token(), &id)
                .await?;
            show_page(app, renderer)
        }
        Command::Delete { task } => {
            let id = resolve_task(app, &task).await?;
            app.tasks.delete(&app.api, app.auth.token(), &id).await?;
            show_page(app, renderer)
        }
        Command::Category(cmd) => cmd_category(app, renderer, cmd).await,
        Command::Version
        | Command::Register(_)
        | Command::Login(_)
        | Command::Logout
        | Command::Whoami
        | Command::Settings(_)
        | Command::Theme(_) => Err(anyhow!("command does not need a session")),
    }
}

/// Whether a command that needs a session may go ahead. With the login hint
/// on, a missing session is an error pointing at `clear login`; with it off
/// the command quietly does nothing.
fn require_login(app: &App) -> anyhow::Result<bool> {
    if app.auth.is_authenticated() {
        return Ok(true);
    }
    if app.settings.redirect_to_login {
        return Err(anyhow!("not logged in; run `clear login <username>` first"));
    }
    debug!("not logged in; skipping command");
    Ok(false)
}

async fn cmd_login(app: &mut App, args: CredentialArgs) -> anyhow::Result<()> {
    let credentials = credentials(args)?;
    app.login(&credentials).await?;
    app.write_theme_css()?;
    println!("Logged in as {}.", credentials.username);
    Ok(())
}

async fn cmd_register(app: &mut App, args: CredentialArgs) -> anyhow::Result<()> {
    let credentials = credentials(args)?;
    app.register(&credentials).await?;
    app.write_theme_css()?;
    println!("Registered and logged in as {}.", credentials.username);
    Ok(())
}

async fn cmd_list(app: &mut App, renderer: &Renderer, args: ListArgs) -> anyhow::Result<()> {
    if args.changes_filters() {
        let mut filters = if args.clear_filters {
            Default::default()
        } else {
            app.tasks.cursor().filters.clone()
        };
        if let Some(category) = &args.category {
            filters.category_id = resolve_category(app, category).await?;
        }
        if let Some(status) = args.status {
            filters.status = status.filter();
        }
        if let Some(from) = args.from {
            filters.start_date = Some(from).filter(|d| !d.is_empty());
        }
        if let Some(to) = args.to {
            filters.end_date = Some(to).filter(|d| !d.is_empty());
        }
        if let Some(search) = args.search {
            filters.keyword = Some(search.trim().to_string()).filter(|k| !k.is_empty());
        }
        let token = app.auth.token();
        app.tasks.replace_filters(&app.api, token, filters).await?;
    }

    let token = app.auth.token();
    match args.page {
        Some(page) => app.tasks.go_to_page(&app.api, token, page).await?,
        None if !app.tasks.is_initialized() => app.tasks.fetch(&app.api, token).await?,
        None => {}
    }
    show_page(app, renderer)
}

async fn cmd_add(app: &mut App, renderer: &Renderer, args: AddArgs) -> anyhow::Result<()> {
    let (category_id, category) = match &args.category {
        Some(key) => category_with_name(app, key).await?,
        None => (None, None),
    };
    let due_date = args
        .due
        .as_deref()
        .map(|raw| parse_due_input(raw, Local::now().naive_local()))
        .transpose()?;
    let draft = TaskDraft {
        title: args.title.join(" "),
        content: args.content.unwrap_or_default(),
        category,
        category_id,
        due_date,
    };

    let token = app.auth.token();
    if let Some(task) = app.tasks.add(&app.api, token, &draft).await? {
        info!(id = %task.id, "task created");
        println!("Created task {}.", task.id);
    }
    show_page(app, renderer)
}

async fn cmd_modify(app: &mut App, renderer: &Renderer, args: ModifyArgs) -> anyhow::Result<()> {
    let id = resolve_task(app, &args.task).await?;
    let (category_id, category) = match &args.category {
        Some(key) => category_with_name(app, key).await?,
        None => (None, None),
    };
    let patch = TaskPatch {
        title: args.title,
        content: args.content,
        category_id,
        category,
        due_date: args
            .due
            .as_deref()
            .map(|raw| parse_due_input(raw, Local::now().naive_local()))
            .transpose()?,
        completed: None,
    };
    if patch.is_empty() {
        return Err(anyhow!("nothing to modify; pass --title, --content, --category or --due"));
    }

    let token = app.auth.token();
    app.tasks.update(&app.api, token, &id, &patch).await?;
    match app.tasks.get(&id) {
        Some(task) => renderer.print_task_info(task),
        None => show_page(app, renderer),
    }
}

async fn cmd_complete(app: &mut App, renderer: &Renderer, reference: &str, completed: bool) -> anyhow::Result<()> {
    let id = resolve_task(app, reference).await?;
    let token = app.auth.token();
    app.tasks
        .update(&app.api, token, &id, &TaskPatch::completion(completed))
        .await?;
    show_page(app, renderer)
}

async fn cmd_category(app: &mut App, renderer: &Renderer, cmd: CategoryCommand) -> anyhow::Result<()> {
    match cmd {
        CategoryCommand::List { refresh } => {
            let token = app.auth.token();
            let categories = if refresh {
                app.categories.refresh(&app.api, token).await?
            } else {
                app.categories.fetch(&app.api, token).await?
            };
            renderer.print_categories(categories)
        }
        CategoryCommand::Add { name } => {
            let token = app.auth.token();
            app.categories.fetch(&app.api, token).await?;
            app.add_category(&name).await?;
            renderer.print_categories(app.categories.categories())
        }
        CategoryCommand::Rename { category, name } => {
            let id = category_id(app, &category).await?;
            app.rename_category(&id, &name).await?;
            renderer.print_categories(app.categories.categories())
        }
        CategoryCommand::Delete { category } => {
            let id = category_id(app, &category).await?;
            app.delete_category(&id).await?;
            renderer.print_categories(app.categories.categories())
        }
    }
}

async fn cmd_theme(app: &mut App, renderer: &Renderer, cmd: ThemeCommand) -> anyhow::Result<()> {
    match cmd {
        ThemeCommand::List => renderer.print_palettes(app.theme.palettes(), app.theme.active_name()),
        ThemeCommand::Current => {
            println!("{}", app.theme.active_name());
            Ok(())
        }
        ThemeCommand::Set { name } => {
            let palette = app.apply_theme(&name.join(" ")).await?;
            let path = app.write_theme_css()?;
            println!("Theme set to {} ({}).", palette.name, path.display());
            Ok(())
        }
        ThemeCommand::Init => {
            let palette = app.init_theme();
            let path = app.write_theme_css()?;
            println!("Applied {} ({}).", palette.name, path.display());
            Ok(())
        }
    }
}

fn show_page(app: &App, renderer: &Renderer) -> anyhow::Result<()> {
    renderer.print_task_table(&app.tasks.snapshot(), Local::now().naive_local())?;
    renderer.print_page_footer(app.tasks.cursor(), app.tasks.total())
}

async fn ensure_page(app: &mut App) -> anyhow::Result<()> {
    if !app.tasks.is_initialized() {
        let token = app.auth.token();
        app.tasks.fetch(&app.api, token).await?;
    }
    Ok(())
}

/// Turns a task reference into an id. `id:<id>` is taken verbatim; a number
/// within the current page is a row number; anything else must be the id of
/// a task on the current page.
async fn resolve_task(app: &mut App, reference: &str) -> anyhow::Result<String> {
    if let Some(id) = reference.strip_prefix(ID_PREFIX) {
        return Ok(id.to_string());
    }
    ensure_page(app).await?;

    let snapshot = app.tasks.snapshot();
    if let Ok(row) = reference.parse::<usize>()
        && (1..=snapshot.len()).contains(&row)
    {
        return Ok(snapshot[row - 1].id.clone());
    }
    if app.tasks.get(reference).is_some() {
        return Ok(reference.to_string());
    }
    Err(anyhow!(
        "no task {reference} on page {}; run `clear list` or use {ID_PREFIX}<id>",
        app.tasks.cursor().current_page
    ))
}

/// Category filter value for `key`; an empty key means every category.
async fn resolve_category(app: &mut App, key: &str) -> anyhow::Result<Option<String>> {
    if key.trim().is_empty() {
        return Ok(None);
    }
    category_id(app, key).await.map(Some)
}

async fn category_id(app: &mut App, key: &str) -> anyhow::Result<String> {
    category_with_name(app, key)
        .await?
        .0
        .ok_or_else(|| anyhow!("unknown category: {key}"))
}

async fn category_with_name(app: &mut App, key: &str) -> anyhow::Result<(Option<String>, Option<String>)> {
    let token = app.auth.token();
    app.categories.fetch(&app.api, token).await?;
    let category = app
        .categories
        .resolve(key.trim())
        .ok_or_else(|| anyhow!("unknown category: {key}"))?;
    Ok((Some(category.id.clone()), Some(category.category_name.clone())))
}

fn credentials(args: CredentialArgs) -> anyhow::Result<Credentials> {
    let password = match args.password {
        Some(password) => password,
        None => read_password_line()?,
    };
    Ok(Credentials {
        username: args.username,
        password,
    })
}

fn read_password_line() -> anyhow::Result<String> {
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read password from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
