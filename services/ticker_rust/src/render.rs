//! Plain-text rendering of the widget state

use cryptomulti_core::utils::format::{format_change, format_price, ChangeDirection};
use cryptomulti_core::{OrderedRow, SchedulerPhase, WidgetConfig, WidgetState};

/// Render the whole widget: header line, then the table or a status message
pub fn render_state(config: &WidgetConfig, state: &WidgetState) -> String {
    let mut lines = vec![title_line(config, state)];

    if !state.loaded {
        lines.push("Loading…".to_string());
    } else if let Some(error) = &state.error {
        lines.push(format!("Error: {}", error));
    } else if state.rows.is_empty() {
        lines.push("No data available.".to_string());
    } else {
        if config.show_headers {
            lines.push(header_line(config));
        }
        lines.extend(state.rows.iter().map(|row| row_line(config, row)));
    }

    lines.join("\n")
}

fn title_line(config: &WidgetConfig, state: &WidgetState) -> String {
    let mut title = config.header.clone();
    if state.phase == SchedulerPhase::Fetching {
        title.push_str(" (updating)");
    }
    if let Some(at) = state.last_success {
        title.push_str(&format!(" - updated {}", at.format("%H:%M:%S UTC")));
    }
    title
}

fn header_line(config: &WidgetConfig) -> String {
    let mut columns = vec![
        "Coin".to_string(),
        format!("Price ({})", config.vs_currency.to_uppercase()),
    ];
    columns.extend(config.change_periods.iter().map(|p| p.as_str().to_uppercase()));
    columns.join(" | ")
}

fn row_line(config: &WidgetConfig, ordered: &OrderedRow) -> String {
    let row = &ordered.row;
    let symbol = row.symbol.to_uppercase();
    let coin = if ordered.label.eq_ignore_ascii_case(&symbol) {
        ordered.label.clone()
    } else {
        format!("{} ({})", ordered.label, symbol)
    };

    let mut columns = vec![
        coin,
        format_price(row.price, &config.vs_currency, config.fiat_round, config.non_fiat_round),
    ];
    columns.extend(config.change_periods.iter().map(|p| change_cell(row.change(p))));

    let mut line = columns.join(" | ");
    if let Some(error) = &row.error {
        line.push_str(&format!("  [{}]", error));
    }
    line
}

/// Percent change with an up/down marker; flat and missing values get none
fn change_cell(value: Option<f64>) -> String {
    let marker = match value.filter(|v| v.is_finite()).map(ChangeDirection::of) {
        Some(ChangeDirection::Up) => "▲ ",
        Some(ChangeDirection::Down) => "▼ ",
        Some(ChangeDirection::Flat) | None => "",
    };
    format!("{}{}", marker, format_change(value))
}
