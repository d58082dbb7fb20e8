use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Gauge, List, ListItem, Paragraph, Wrap},
};

use crate::controls::ControlsState;
use crate::doctor::{FLATHUB_URL, MPV_INSTALL_URL};
use crate::wizard::{WizardState, WizardStep};

use super::app::{App, View};

pub fn draw(frame: &mut Frame, app: &App) {
    match app.view {
        View::Wizard => draw_wizard(frame, app),
        View::Controls => {
            if let Some(controls) = &app.controls {
                draw_controls(frame, app, controls);
            }
        }
        View::PlayerMissing => draw_player_missing(frame, app),
    }

    if let Some(message) = &app.fatal_error {
        draw_fatal(frame, message);
    }
}

/// Areas of the controls view. Shared with mouse handling so clicks land on
/// the seek bar that was drawn.
pub struct ControlsLayout {
    pub header: Rect,
    pub status: Rect,
    pub times: Rect,
    pub seek_bar: Rect,
    pub help: Rect,
}

impl ControlsLayout {
    pub fn new(area: Rect) -> Self {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .margin(1)
            .constraints([
                Constraint::Length(4), // Title
                Constraint::Length(1), // Status
                Constraint::Length(1), // Spacer
                Constraint::Length(1), // Elapsed / remaining
                Constraint::Length(1), // Seek bar
                Constraint::Min(0),    // Empty
                Constraint::Length(2), // Help
            ])
            .split(area);

        Self {
            header: chunks[0],
            status: chunks[1],
            times: chunks[3],
            seek_bar: chunks[4],
            help: chunks[6],
        }
    }

    /// Horizontal position on the seek bar as a fraction of its width.
    pub fn seek_fraction(&self, column: u16) -> f64 {
        if self.seek_bar.width == 0 {
            return 0.0;
        }
        let offset = column.saturating_sub(self.seek_bar.x);
        (offset as f64 / self.seek_bar.width as f64).clamp(0.0, 1.0)
    }

    pub fn on_seek_bar(&self, column: u16, row: u16) -> bool {
        row == self.seek_bar.y
            && column >= self.seek_bar.x
            && column < self.seek_bar.x + self.seek_bar.width
    }
}

fn draw_wizard(frame: &mut Frame, app: &App) {
    let wizard = &app.wizard;
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(2)
        .constraints([
            Constraint::Length(3), // Title
            Constraint::Length(3), // Progress
            Constraint::Min(0),    // Content
            Constraint::Length(2), // Help
        ])
        .split(frame.area());

    let title = Paragraph::new("tanglecast")
        .style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .block(Block::default());
    frame.render_widget(title, chunks[0]);

    let progress = format!(
        "Step {} of {} - {}",
        wizard.step.index() + 1,
        WizardStep::total(),
        wizard.step.label()
    );
    let progress_widget = Paragraph::new(progress)
        .style(Style::default().fg(Color::Yellow))
        .block(Block::default().borders(Borders::BOTTOM));
    frame.render_widget(progress_widget, chunks[1]);

    match wizard.step {
        WizardStep::Welcome => draw_welcome(frame, app, chunks[2]),
        WizardStep::MediaSelection => draw_media_selection(frame, wizard, chunks[2]),
        WizardStep::Ready => draw_ready(frame, wizard, chunks[2]),
    }

    let help_text = match wizard.step {
        WizardStep::Welcome if wizard.notice.is_some() => "Enter/Esc: dismiss",
        WizardStep::Welcome => "Enter: look up | Esc: clear/quit",
        WizardStep::MediaSelection => "↑/↓: navigate | Space: select | Enter: select & continue | Esc: back",
        WizardStep::Ready => "Space: confirm rights | Enter: play | Esc: back | q: quit",
    };
    let help = Paragraph::new(help_text).style(Style::default().fg(Color::DarkGray));
    frame.render_widget(help, chunks[3]);

    if let Some(notice) = &wizard.notice {
        draw_message_popup(frame, "Error", notice, Color::Red);
    }
}

fn draw_welcome(frame: &mut Frame, app: &App, area: Rect) {
    let wizard = &app.wizard;
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2), // Prompt
            Constraint::Length(3), // Input
            Constraint::Length(1), // Status
            Constraint::Min(0),
        ])
        .split(area);

    let prompt = Paragraph::new("Paste a magnet link to see what's inside.")
        .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(prompt, chunks[0]);

    let input_style = if wizard.entry_enabled() {
        Style::default().fg(Color::White)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let input = Paragraph::new(wizard.selection.identifier.as_str())
        .style(input_style)
        .block(Block::default().borders(Borders::ALL).title("Magnet link"));
    frame.render_widget(input, chunks[1]);

    if wizard.entry_enabled() && wizard.notice.is_none() {
        let width = chunks[1].width.saturating_sub(2);
        let cursor = (wizard.selection.identifier.chars().count() as u16).min(width);
        frame.set_cursor_position((chunks[1].x + cursor + 1, chunks[1].y + 1));
    }

    if wizard.lookup_in_flight {
        let status = Paragraph::new(format!("{} Getting info...", app.spinner()))
            .style(Style::default().fg(Color::Yellow));
        frame.render_widget(status, chunks[2]);
    }
}

fn draw_media_selection(frame: &mut Frame, wizard: &WizardState, area: Rect) {
    let selected = wizard.selection.selected_path.as_deref();

    let items: Vec<ListItem> = wizard
        .selection
        .candidates
        .iter()
        .enumerate()
        .map(|(i, candidate)| {
            let style = if i == wizard.cursor {
                Style::default()
                    .fg(Color::Black)
                    .bg(Color::Cyan)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };

            let marker = if selected == Some(candidate.path.as_str()) {
                "● "
            } else {
                "○ "
            };

            let line = Line::from(vec![
                Span::raw(marker),
                Span::styled(
                    format!("{:>9}", candidate.size_label()),
                    Style::default().fg(Color::DarkGray),
                ),
                Span::raw(" | "),
                Span::raw(candidate.display_title()),
            ]);

            ListItem::new(line).style(style)
        })
        .collect();

    let list_title = format!(
        "{} [{} files]",
        wizard.bundle_name,
        wizard.selection.candidates.len()
    );
    let list = List::new(items).block(Block::default().borders(Borders::ALL).title(list_title));
    frame.render_widget(list, area);
}

fn draw_ready(frame: &mut Frame, wizard: &WizardState, area: Rect) {
    let file = wizard
        .selected_candidate()
        .map(|c| c.display_title())
        .unwrap_or_default();

    let checkbox = if wizard.rights_confirmed { "[x]" } else { "[ ]" };
    let play_style = if wizard.can_play() {
        Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::DarkGray)
    };

    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            "You're all set!",
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(file, Style::default().fg(Color::Cyan))),
        Line::from(""),
        Line::from(vec![
            Span::styled(checkbox, Style::default().fg(Color::Yellow)),
            Span::raw(" I have the right to stream the selected media"),
        ]),
        Line::from(""),
        Line::from(Span::styled("▶ Play (Enter)", play_style)),
    ];

    let content = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title("Ready"));
    frame.render_widget(content, area);
}

fn draw_controls(frame: &mut Frame, app: &App, controls: &ControlsState) {
    let layout = ControlsLayout::new(frame.area());

    let header = Paragraph::new(vec![
        Line::from(Span::styled(
            controls.title.clone(),
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            controls.subtitle.clone(),
            Style::default().fg(Color::DarkGray),
        )),
    ])
    .block(Block::default().borders(Borders::BOTTOM));
    frame.render_widget(header, layout.header);

    let subtitle_track = controls.subtitles.active_track();
    let mut status = vec![
        Span::styled(
            controls.play_pause.label(),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::raw(format!("  Vol {:.0}%", controls.volume * 100.0)),
        Span::raw(if controls.fullscreen {
            "  Fullscreen"
        } else {
            ""
        }),
        Span::raw(format!("  Subtitles: {}", subtitle_track.title())),
    ];
    if controls.subtitles.pending().is_some() {
        status.push(Span::styled(
            format!("  {} fetching subtitle", app.spinner()),
            Style::default().fg(Color::Yellow),
        ));
    }
    if let Some(message) = app.status_message() {
        status.push(Span::styled(
            format!("  {}", message),
            Style::default().fg(Color::Green),
        ));
    }
    frame.render_widget(Paragraph::new(Line::from(status)), layout.status);

    let times = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(layout.times);
    frame.render_widget(Paragraph::new(controls.elapsed_label()), times[0]);
    frame.render_widget(
        Paragraph::new(controls.remaining_label()).alignment(Alignment::Right),
        times[1],
    );

    let bar_color = if controls.seek.is_seeking() {
        Color::Yellow
    } else {
        Color::Cyan
    };
    let gauge = Gauge::default()
        .gauge_style(Style::default().fg(bar_color).bg(Color::DarkGray))
        .ratio(controls.progress())
        .label("");
    frame.render_widget(gauge, layout.seek_bar);

    let help = Paragraph::new(
        "Space: play/pause | ←/→: seek | +/-: volume | f: fullscreen | s: subtitles | i: info | y: copy link | q: stop",
    )
    .style(Style::default().fg(Color::DarkGray))
    .wrap(Wrap { trim: true });
    frame.render_widget(help, layout.help);

    if controls.is_preparing() {
        draw_preparing(frame, app);
    } else if controls.subtitles_open {
        draw_subtitle_selector(frame, controls);
    } else if controls.description_open {
        draw_message_popup(frame, "Description", &controls.description, Color::Cyan);
    }

    if let Some(prompt) = &controls.local_prompt {
        draw_local_prompt(frame, prompt);
    }
}

fn draw_preparing(frame: &mut Frame, app: &App) {
    let popup_area = centered_rect(44, 7, frame.area());
    frame.render_widget(Clear, popup_area);

    let text = vec![
        Line::from(""),
        Line::from(Span::styled(
            format!("{} Preparing stream...", app.spinner()),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled("Esc", Style::default().fg(Color::Cyan)),
            Span::raw(" - Cancel"),
        ]),
    ];

    let popup = Paragraph::new(text).alignment(Alignment::Center).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title("Preparing"),
    );
    frame.render_widget(popup, popup_area);
}

fn draw_subtitle_selector(frame: &mut Frame, controls: &ControlsState) {
    let tracks = controls.subtitles.tracks();
    let height = (tracks.len() as u16 * 2 + 3).min(frame.area().height.saturating_sub(2));
    let popup_area = centered_rect(70, height, frame.area());
    frame.render_widget(Clear, popup_area);

    let items: Vec<ListItem> = tracks
        .iter()
        .enumerate()
        .map(|(i, track)| {
            let style = if i == controls.subtitle_cursor {
                Style::default()
                    .fg(Color::Black)
                    .bg(Color::Cyan)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };

            let marker = if i == controls.subtitles.active() {
                "● "
            } else if controls.subtitles.pending() == Some(i) {
                "… "
            } else {
                "○ "
            };

            let mut title = vec![Span::raw(marker), Span::raw(track.title())];
            if let Some(language) = track.language() {
                title.push(Span::styled(
                    format!(" [{}]", language),
                    Style::default().fg(Color::Yellow),
                ));
            }

            ListItem::new(vec![
                Line::from(title),
                Line::from(Span::styled(
                    format!("  {}", track.subtitle()),
                    Style::default().fg(Color::DarkGray),
                )),
            ])
            .style(style)
        })
        .collect();

    let list = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title("Subtitles (Enter: select | a: add file | Esc: close)"),
    );
    frame.render_widget(list, popup_area);
}

fn draw_local_prompt(frame: &mut Frame, prompt: &str) {
    let popup_area = centered_rect(70, 3, frame.area());
    frame.render_widget(Clear, popup_area);

    let input = Paragraph::new(format!("{}▌", prompt)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title("Subtitle file path (Enter: add | Esc: cancel)"),
    );
    frame.render_widget(input, popup_area);
}

fn draw_player_missing(frame: &mut Frame, app: &App) {
    let popup_area = centered_rect(72, 20, frame.area());
    frame.render_widget(Clear, popup_area);

    let key = |k: &'static str| Span::styled(k, Style::default().fg(Color::Cyan));

    let mut lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            "mpv is not installed",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from("tanglecast plays media with mpv, which could not be found."),
        Line::from(""),
    ];

    if cfg!(target_os = "linux") {
        lines.push(Line::from(vec![
            key("f"),
            Span::raw(format!(" - Get it from Flathub ({})", FLATHUB_URL)),
        ]));
    }
    lines.push(Line::from(vec![
        key("w"),
        Span::raw(format!(" - Installation guide ({})", MPV_INSTALL_URL)),
    ]));
    lines.push(Line::from(vec![key("m"), Span::raw(" - Configure manually")]));
    lines.push(Line::from(vec![key("r"), Span::raw(" - Look for mpv again")]));
    lines.push(Line::from(vec![key("q"), Span::raw(" - Quit")]));

    if app.is_probing {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!("{} Looking for mpv...", app.spinner()),
            Style::default().fg(Color::Yellow),
        )));
    } else if let Some(message) = app.status_message() {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            message.to_string(),
            Style::default().fg(Color::Red),
        )));
    }

    if app.show_manual_setup {
        let path = app
            .config_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "config.toml".to_string());
        lines.push(Line::from(""));
        lines.push(Line::from(format!("Add this to {}:", path)));
        lines.push(Line::from(Span::styled(
            "[player]",
            Style::default().fg(Color::Green),
        )));
        lines.push(Line::from(Span::styled(
            "command = \"/path/to/mpv\"",
            Style::default().fg(Color::Green),
        )));
    }

    let popup = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Yellow))
                .title("Player Missing"),
        );
    frame.render_widget(popup, popup_area);
}

fn draw_fatal(frame: &mut Frame, message: &str) {
    let popup_area = centered_rect(64, 11, frame.area());
    frame.render_widget(Clear, popup_area);

    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            "Something went wrong",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(message.to_string()),
        Line::from(""),
        Line::from(vec![
            Span::styled("r", Style::default().fg(Color::Cyan)),
            Span::raw(" - Report this error  |  "),
            Span::styled("c", Style::default().fg(Color::Cyan)),
            Span::raw(" - Close  |  "),
            Span::styled("Esc", Style::default().fg(Color::Cyan)),
            Span::raw(" - Dismiss"),
        ]),
    ];

    let popup = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Red))
                .title("Error"),
        );
    frame.render_widget(popup, popup_area);
}

fn draw_message_popup(frame: &mut Frame, title: &str, message: &str, color: Color) {
    let lines = message.lines().count().max(1) as u16;
    let popup_area = centered_rect(70, (lines + 4).min(20), frame.area());
    frame.render_widget(Clear, popup_area);

    let popup = Paragraph::new(message.to_string())
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(color))
                .title(format!("{} (Esc: close)", title)),
        );
    frame.render_widget(popup, popup_area);
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let popup_width = width.min(area.width.saturating_sub(4));
    let popup_height = height.min(area.height);
    let popup_x = area.x + (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = area.y + (area.height.saturating_sub(popup_height)) / 2;
    Rect::new(popup_x, popup_y, popup_width, popup_height)
}
