use llamachat_core::models::{format_duration, format_thousands};
use llamachat_core::{
    ErrorLevel, ErrorStore, ModelInfo, PartialResponse, Role, SessionState, TurnState,
};
use ratatui::{
    Frame,
    layout::{Constraint, Flex, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};

use crate::app::UiState;

const SIDEBAR_WIDTH: u16 = 34;

/// Everything one frame needs, borrowed from wherever it currently lives
pub struct ChatView<'a> {
    pub session: &'a SessionState,
    pub state: TurnState,
    pub partial: Option<&'a PartialResponse>,
    pub ui: &'a UiState,
    pub errors: &'a ErrorStore,
}

pub fn draw(frame: &mut Frame, view: &ChatView) {
    let [main, sidebar] =
        Layout::horizontal([Constraint::Min(30), Constraint::Length(SIDEBAR_WIDTH)])
            .areas(frame.area());
    let [transcript, input, status] = Layout::vertical([
        Constraint::Min(3),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(main);

    draw_transcript(frame, transcript, view);
    draw_input(frame, input, view);
    draw_status(frame, status, view);
    draw_sidebar(frame, sidebar, view);

    if view.ui.show_error_log {
        draw_error_log(frame, view.errors);
    }
}

fn draw_transcript(frame: &mut Frame, area: Rect, view: &ChatView) {
    let mut lines: Vec<Line> = Vec::new();

    for message in view.session.history().iter() {
        let (label, style) = match message.role() {
            Role::User => ("You", Style::default().fg(Color::Cyan)),
            Role::Assistant => ("Assistant", Style::default().fg(Color::Green)),
            Role::System => ("System", Style::default().fg(Color::DarkGray)),
        };
        push_block(&mut lines, label, style, message.content());
    }

    if let Some(partial) = &view.ui.interrupted {
        push_block(
            &mut lines,
            "Assistant (interrupted)",
            Style::default().fg(Color::Yellow),
            partial,
        );
    }

    if view.state == TurnState::Streaming {
        let text = view
            .partial
            .map(PartialResponse::display)
            .unwrap_or_else(|| llamachat_core::IN_PROGRESS_MARKER.to_string());
        push_block(&mut lines, "Assistant", Style::default().fg(Color::Green), &text);
    }

    if lines.is_empty() {
        lines.push(Line::styled(
            "Type a message and press Enter.",
            Style::default().fg(Color::DarkGray),
        ));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" {} ", view.session.config().model_name()));
    let inner_width = area.width.saturating_sub(2);
    let inner_height = area.height.saturating_sub(2);
    let scroll = wrapped_height(&lines, inner_width).saturating_sub(inner_height);

    let paragraph = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0));
    frame.render_widget(paragraph, area);
}

fn push_block(lines: &mut Vec<Line<'static>>, label: &str, style: Style, content: &str) {
    lines.push(Line::styled(
        label.to_string(),
        style.add_modifier(Modifier::BOLD),
    ));
    lines.extend(content.lines().map(|line| Line::from(line.to_string())));
    lines.push(Line::default());
}

/// Rows `lines` occupy when wrapped at `width` columns
pub fn wrapped_height(lines: &[Line], width: u16) -> u16 {
    let width = usize::from(width.max(1));
    let rows: usize = lines
        .iter()
        .map(|line| line.width().div_ceil(width).max(1))
        .sum();
    u16::try_from(rows).unwrap_or(u16::MAX)
}

fn draw_input(frame: &mut Frame, area: Rect, view: &ChatView) {
    let streaming = view.state == TurnState::Streaming;
    let (title, style, text) = if streaming {
        (
            " Waiting for response... ",
            Style::default().fg(Color::DarkGray),
            view.ui.input.clone(),
        )
    } else if view.ui.busy.is_some() {
        (" Please wait ", Style::default().fg(Color::DarkGray), view.ui.input.clone())
    } else {
        (" Message (Enter to send) ", Style::default(), format!("{}█", view.ui.input))
    };

    let input = Paragraph::new(Span::styled(text, style))
        .block(Block::default().borders(Borders::ALL).title(title));
    frame.render_widget(input, area);
}

fn draw_status(frame: &mut Frame, area: Rect, view: &ChatView) {
    let line = if let Some(busy) = &view.ui.busy {
        Line::styled(busy.clone(), Style::default().fg(Color::Yellow))
    } else if let Some(notice) = &view.ui.notice {
        let color = if notice.is_error { Color::Red } else { Color::Blue };
        Line::styled(notice.text.clone(), Style::default().fg(color))
    } else if view.state == TurnState::Streaming {
        Line::styled("Generating...", Style::default().fg(Color::Yellow))
    } else {
        Line::styled("Ready", Style::default().fg(Color::DarkGray))
    };
    frame.render_widget(Paragraph::new(line), area);
}

fn draw_sidebar(frame: &mut Frame, area: Rect, view: &ChatView) {
    let session = view.session;
    let config = session.config();
    let stats = session.stats();
    let heading = Style::default().add_modifier(Modifier::BOLD);

    let mut lines = vec![Line::styled("Model", heading), Line::from(config.model_name().to_string())];
    lines.push(if session.model_available() {
        Line::styled("● available", Style::default().fg(Color::Green))
    } else {
        Line::styled("● not installed", Style::default().fg(Color::Red))
    });
    lines.push(Line::styled(config.host().to_string(), Style::default().fg(Color::DarkGray)));
    lines.push(Line::default());

    lines.push(Line::styled("Parameters", heading));
    lines.push(Line::from(format!("Temperature  {:.1}", config.temperature())));
    lines.push(Line::from(format!("Top P        {:.1}", config.top_p())));
    lines.push(Line::from(format!("Top K        {}", config.top_k())));
    lines.push(Line::default());

    lines.push(Line::styled("Statistics", heading));
    lines.push(Line::from(format!(
        "Exchanges    {}",
        format_thousands(stats.total_exchanges())
    )));
    lines.push(Line::from(format!(
        "Characters   {}",
        format_thousands(stats.total_chars())
    )));
    lines.push(Line::from(format!(
        "Duration     {}",
        format_duration(stats.elapsed())
    )));
    lines.push(Line::default());

    if let Some(info) = &view.ui.model_info {
        lines.push(Line::styled("Model info", heading));
        lines.extend(model_info_lines(info, config.host()));
        lines.push(Line::default());
    }

    let (errors, warnings) = (view.errors.error_count(), view.errors.warning_count());
    if errors + warnings > 0 {
        lines.push(Line::styled(
            format!("{} errors, {} warnings (Ctrl-E)", errors, warnings),
            Style::default().fg(Color::Red),
        ));
        lines.push(Line::default());
    }

    lines.push(Line::styled("Keys", heading));
    for help in [
        "Enter    send",
        "Ctrl-L   clear chat",
        "Ctrl-D   download model",
        "Ctrl-O   model info",
        "Ctrl-R   re-check model",
        "Alt-↑/↓  temperature",
        "Ctrl-E   error log",
        "Esc      quit",
    ] {
        lines.push(Line::styled(help, Style::default().fg(Color::DarkGray)));
    }

    let sidebar = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(" Session "))
        .wrap(Wrap { trim: true });
    frame.render_widget(sidebar, area);
}

pub fn model_info_lines(info: &ModelInfo, host: &str) -> Vec<Line<'static>> {
    let mut lines = vec![Line::from(format!("Name    {}", info.name))];
    match info.size_gb() {
        Some(gb) => lines.push(Line::from(format!("Size    {:.1} GB", gb))),
        None => lines.push(Line::from("Size    unknown")),
    }
    if let Some(family) = &info.family {
        lines.push(Line::from(format!("Family  {}", family)));
    }
    if let Some(params) = &info.parameter_size {
        lines.push(Line::from(format!("Params  {}", params)));
    }
    if let Some(quant) = &info.quantization_level {
        lines.push(Line::from(format!("Quant   {}", quant)));
    }
    lines.push(Line::from(format!("Host    {}", host)));
    lines
}

fn draw_error_log(frame: &mut Frame, errors: &ErrorStore) {
    let area = popup_area(frame.area(), 80, 60);
    let entries = errors.get_all_entries();

    let lines: Vec<Line> = if entries.is_empty() {
        vec![Line::styled("No warnings or errors.", Style::default().fg(Color::DarkGray))]
    } else {
        entries
            .iter()
            .rev()
            .map(|entry| {
                let (label, color) = match entry.level {
                    ErrorLevel::Error => ("ERROR", Color::Red),
                    ErrorLevel::Warning => ("WARN ", Color::Yellow),
                };
                Line::from(vec![
                    Span::styled(
                        entry.timestamp.format("%H:%M:%S ").to_string(),
                        Style::default().fg(Color::DarkGray),
                    ),
                    Span::styled(label, Style::default().fg(color)),
                    Span::raw(format!(" {}", entry.message)),
                ])
            })
            .collect()
    };

    let log = Paragraph::new(lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Error log (Ctrl-E to close) "),
        )
        .wrap(Wrap { trim: false });
    frame.render_widget(Clear, area);
    frame.render_widget(log, area);
}

/// Centered rect taking the given percentages of `area`
fn popup_area(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let [area] = Layout::vertical([Constraint::Percentage(percent_y)])
        .flex(Flex::Center)
        .areas(area);
    let [area] = Layout::horizontal([Constraint::Percentage(percent_x)])
        .flex(Flex::Center)
        .areas(area);
    area
}
