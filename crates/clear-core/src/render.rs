use std::io::{self, IsTerminal, Write};

use chrono::NaiveDateTime;
use clear_shared::{CategoryRecord, UserStatus};
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::datetime::{DUE_DATE_FORMAT, display_due};
use crate::filter::{Cursor, StatusFilter};
use crate::notify::{Toast, ToastKind};
use crate::task::Task;
use crate::theme::Palette;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color = cfg.get_bool("color")?.unwrap_or(true);
        Ok(Self { color })
    }

    /// Prints one page of tasks. Rows are numbered from 1 so commands can
    /// refer to a task by its position on the page.
    #[tracing::instrument(skip(self, tasks, now))]
    pub fn print_task_table(&self, tasks: &[Task], now: NaiveDateTime) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        if tasks.is_empty() {
            writeln!(out, "No tasks.")?;
            return Ok(());
        }

        let headers = ["#", "ID", "Done", "Due", "Category", "Title"]
            .map(str::to_string)
            .to_vec();

        let mut rows = Vec::with_capacity(tasks.len());
        for (idx, task) in tasks.iter().enumerate() {
            let due = task.due_date.as_deref().map(display_due).unwrap_or_default();
            let overdue = !task.completed
                && task
                    .due_date
                    .as_deref()
                    .and_then(|raw| NaiveDateTime::parse_from_str(raw, DUE_DATE_FORMAT).ok())
                    .is_some_and(|due| due < now);
            let due = if overdue { self.paint(&due, "31") } else { due };

            let done = if task.completed {
                self.paint("[x]", "32")
            } else {
                "[ ]".to_string()
            };

            rows.push(vec![
                self.paint(&(idx + 1).to_string(), "33"),
                task.id.clone(),
                done,
                due,
                task.category.clone(),
                task.title.clone(),
            ]);
        }

        write_table(&mut out, headers, rows)?;
        Ok(())
    }

    pub fn print_page_footer(&self, cursor: &Cursor, total: u64) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(
            out,
            "\nPage {}/{} ({} task{})",
            cursor.current_page,
            cursor.total_pages.max(1),
            total,
            if total == 1 { "" } else { "s" }
        )?;

        let f = &cursor.filters;
        let mut active = Vec::new();
        if let Some(category) = &f.category_id {
            active.push(format!("category={category}"));
        }
        if let Some(status) = f.status {
            active.push(format!(
                "status={}",
                match status {
                    StatusFilter::InProgress => "todo",
                    StatusFilter::Completed => "done",
                }
            ));
        }
        if let Some(start) = &f.start_date {
            active.push(format!("from={start}"));
        }
        if let Some(end) = &f.end_date {
            active.push(format!("to={end}"));
        }
        if let Some(keyword) = &f.keyword {
            active.push(format!("search={keyword:?}"));
        }
        if !active.is_empty() {
            writeln!(out, "Filters: {}", active.join(" "))?;
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, task))]
    pub fn print_task_info(&self, task: &Task) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        writeln!(out, "id        {}", task.id)?;
        writeln!(out, "title     {}", task.title)?;
        writeln!(out, "status    {}", if task.completed { "done" } else { "in progress" })?;
        writeln!(
            out,
            "category  {}{}",
            task.category,
            task.category_id
                .as_deref()
                .map(|id| format!(" ({id})"))
                .unwrap_or_default()
        )?;
        if let Some(due) = &task.due_date {
            writeln!(out, "due       {}", display_due(due))?;
        }
        writeln!(out, "created   {}", task.created_at)?;
        if !task.content.is_empty() {
            writeln!(out, "\n{}", task.content)?;
        }
        Ok(())
    }

    pub fn print_categories(&self, categories: &[CategoryRecord]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        if categories.is_empty() {
            writeln!(out, "No categories.")?;
            return Ok(());
        }
        let rows = categories
            .iter()
            .map(|c| vec![self.paint(&c.id, "33"), c.category_name.clone()])
            .collect();
        write_table(&mut out, vec!["ID".to_string(), "Name".to_string()], rows)
    }

    pub fn print_palettes(&self, palettes: &[Palette], active: &str) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        let rows = palettes
            .iter()
            .enumerate()
            .map(|(idx, palette)| {
                let marker = if palette.name == active { "*" } else { "" };
                vec![
                    (idx + 1).to_string(),
                    marker.to_string(),
                    palette.name.to_string(),
                    palette.color("--primary-color").unwrap_or_default().to_string(),
                    palette.color("--background-color").unwrap_or_default().to_string(),
                ]
            })
            .collect();
        let headers = ["ID", "", "Name", "Primary", "Background"]
            .map(str::to_string)
            .to_vec();
        write_table(&mut out, headers, rows)
    }

    pub fn print_stats(&self, status: &UserStatus) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        if let Some(username) = &status.username {
            writeln!(out, "user      {username}")?;
        }
        writeln!(out, "done      {}", status.num_of_done)?;
        writeln!(out, "undone    {}", status.num_of_undone)?;
        Ok(())
    }

    /// Flushes queued toasts to stderr.
    pub fn print_toasts(&self, toasts: &[Toast]) -> anyhow::Result<()> {
        let mut err = io::stderr().lock();
        let painted = self.color && io::stderr().is_terminal();
        for toast in toasts {
            let (label, code) = match toast.kind {
                ToastKind::Success => ("ok", "32"),
                ToastKind::Error => ("error", "31"),
                ToastKind::Info => ("info", "36"),
                ToastKind::Warning => ("warning", "33"),
            };
            if painted {
                writeln!(err, "\x1b[{code}m{label}\x1b[0m: {}", toast.message)?;
            } else {
                writeln!(err, "{label}: {}", toast.message)?;
            }
        }
        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = headers
        .iter()
        .map(|h| UnicodeWidthStr::width(h.as_str()))
        .collect::<Vec<_>>();

    for row in &rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    let header_line = headers
        .iter()
        .zip(&widths)
        .map(|(h, w)| pad(h, *w))
        .collect::<Vec<_>>()
        .join(" ");
    writeln!(writer, "{}", header_line.trim_end())?;
    let rule = widths
        .iter()
        .map(|w| "-".repeat(*w))
        .collect::<Vec<_>>()
        .join(" ");
    writeln!(writer, "{rule}")?;

    for row in rows {
        let line = row
            .iter()
            .zip(&widths)
            .map(|(cell, w)| pad(cell, *w))
            .collect::<Vec<_>>()
            .join(" ");
        writeln!(writer, "{}", line.trim_end())?;
    }

    Ok(())
}

fn pad(cell: &str, width: usize) -> String {
    let visible = UnicodeWidthStr::width(strip_ansi(cell).as_str());
    format!("{cell}{}", " ".repeat(width.saturating_sub(visible)))
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            escaped = ch != 'm';
            continue;
        }
        if ch == '\x1b' {
            escaped = true;
            continue;
        }
        out.push(ch);
    }

    out
}
