use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Widget, Wrap},
};
use std::time::Duration;
use time_humanize::{Accuracy, HumanTime, Tense};

use crate::{App, AppState};
use trod::health::WorkoutRecord;
use trod::recorder::{estimated_calories, DEFAULT_BODY_WEIGHT_KG};

const HORIZONTAL_MARGIN: u16 = 4;
const VERTICAL_MARGIN: u16 = 1;

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs >= 3600 {
        format!("{}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
    } else {
        format!("{}:{:02}", secs / 60, secs % 60)
    }
}

fn workout_line(record: &WorkoutRecord) -> String {
    let age = record.started_at.elapsed().unwrap_or(Duration::ZERO);
    format!(
        "{:<18} {:>6} steps  {:>6.2} km  {:>5.0} kcal  {:>7}",
        HumanTime::from(age).to_text_en(Accuracy::Rough, Tense::Past),
        record.steps,
        record.distance_km,
        record.estimated_kcal,
        format_duration(record.duration),
    )
}

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let bold = Style::default().add_modifier(Modifier::BOLD);
        let dim = Style::default().add_modifier(Modifier::DIM);
        let red_bold = bold.fg(Color::Red);
        let yellow = Style::default().fg(Color::Yellow);
        let green_bold = bold.fg(Color::Green);
        let magenta_bold = bold.fg(Color::Magenta);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .vertical_margin(VERTICAL_MARGIN)
            .constraints([
                Constraint::Length(2),
                Constraint::Length(2),
                Constraint::Min(4),
                Constraint::Length(1),
            ])
            .split(area);

        Paragraph::new(Line::from(vec![
            Span::styled("trod", magenta_bold),
            Span::styled("  treadmill walking tracker", dim),
        ]))
        .render(chunks[0], buf);

        self.render_banner(chunks[1], buf, red_bold, yellow);

        match self.state {
            AppState::Idle => self.render_idle(chunks[2], buf, dim, green_bold),
            AppState::Tracking => self.render_tracking(chunks[2], buf, bold, dim),
            AppState::Summary => self.render_summary(chunks[2], buf, bold, dim, red_bold),
            AppState::History => self.render_history(chunks[2], buf, dim),
        }

        let hints = match self.state {
            AppState::Idle => "(s)tart  (h)istory  (q)uit",
            AppState::Tracking => "(s)top  (esc) discard",
            AppState::Summary => "type distance  (u)nit  (enter) save  (esc) discard",
            AppState::History => "(esc) back  (q)uit",
        };
        Paragraph::new(Span::styled(hints, dim))
            .alignment(Alignment::Center)
            .render(chunks[3], buf);
    }
}

impl App {
    fn render_banner(&self, area: Rect, buf: &mut Buffer, red_bold: Style, yellow: Style) {
        let line = if let Some(err) = &self.save_error {
            Line::from(Span::styled(format!("save failed: {err}"), red_bold))
        } else if let Some(err) = self.tracker.last_error() {
            Line::from(Span::styled(err.to_string(), red_bold))
        } else if let Some(err) = &self.recorder.authorization_error {
            Line::from(Span::styled(err.to_string(), red_bold))
        } else if let Some(status) = &self.status {
            Line::from(Span::styled(status.clone(), yellow))
        } else {
            Line::default()
        };
        Paragraph::new(line)
            .wrap(Wrap { trim: true })
            .render(area, buf);
    }

    fn render_idle(&self, area: Rect, buf: &mut Buffer, dim: Style, green_bold: Style) {
        let mut lines = vec![
            Line::default(),
            Line::from(Span::styled("press s to start walking", dim)),
        ];
        if let Some(record) = &self.last_saved {
            lines.push(Line::default());
            lines.push(Line::from(vec![
                Span::styled("last workout  ", green_bold),
                Span::raw(workout_line(record)),
            ]));
        }
        Paragraph::new(lines)
            .alignment(Alignment::Center)
            .render(area, buf);
    }

    fn render_tracking(&self, area: Rect, buf: &mut Buffer, bold: Style, dim: Style) {
        let duration = self.tracker.session_duration();
        let steps = self.tracker.steps();
        let minutes = duration.as_secs_f64() / 60.0;
        let cadence = if minutes > 0.0 {
            steps as f64 / minutes
        } else {
            0.0
        };

        let lines = vec![
            Line::default(),
            Line::from(Span::styled(
                format!("{steps}"),
                bold.add_modifier(Modifier::UNDERLINED),
            )),
            Line::from(Span::styled("steps", dim)),
            Line::default(),
            Line::from(Span::styled(format_duration(duration), bold)),
            Line::from(Span::styled(
                format!("{cadence:.0} steps/min"),
                dim,
            )),
        ];
        Paragraph::new(lines)
            .alignment(Alignment::Center)
            .render(area, buf);
    }

    fn render_summary(
        &self,
        area: Rect,
        buf: &mut Buffer,
        bold: Style,
        dim: Style,
        red_bold: Style,
    ) {
        let Some(snapshot) = &self.snapshot else {
            Paragraph::new(Span::styled("no finished session", red_bold))
                .alignment(Alignment::Center)
                .render(area, buf);
            return;
        };

        let weight = self
            .recorder
            .user_weight_kg
            .unwrap_or(DEFAULT_BODY_WEIGHT_KG);
        let kcal = estimated_calories(weight, snapshot.duration);

        let lines = vec![
            Line::from(vec![
                Span::styled(format!("{} steps", snapshot.steps), bold),
                Span::styled(
                    format!("  in {}", format_duration(snapshot.duration)),
                    dim,
                ),
            ]),
            Line::default(),
            Line::from(vec![
                Span::styled("distance walked: ", dim),
                Span::styled(
                    if self.distance_input.is_empty() {
                        "_".to_string()
                    } else {
                        self.distance_input.clone()
                    },
                    bold,
                ),
                Span::styled(format!(" {}", self.unit.abbrev()), dim),
            ]),
            Line::default(),
            Line::from(Span::styled(
                format!("≈ {kcal:.0} kcal at {weight:.0} kg"),
                dim,
            )),
        ];
        Paragraph::new(lines)
            .alignment(Alignment::Center)
            .render(area, buf);
    }

    fn render_history(&self, area: Rect, buf: &mut Buffer, dim: Style) {
        let mut lines = Vec::new();
        if self.history.is_empty() {
            lines.push(Line::from(Span::styled("no workouts recorded yet", dim)));
        } else {
            for record in &self.history {
                lines.push(Line::from(Span::raw(workout_line(record))));
            }
        }
        Paragraph::new(lines)
            .alignment(Alignment::Center)
            .render(area, buf);
    }
}
