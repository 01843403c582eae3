use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState},
    Frame,
};

use cartcache_core::utils::{format_euros, truncate_string};

use crate::app::{App, AppState, View};

use super::styles;

/// Longest description shown in the product table.
const DESCRIPTION_WIDTH: usize = 48;

pub fn render(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title bar
            Constraint::Length(2), // Category tabs
            Constraint::Min(8),    // Main content
            Constraint::Length(2), // Status bar
        ])
        .split(frame.area());

    render_title_bar(frame, app, chunks[0]);
    render_tabs(frame, app, chunks[1]);
    render_main_content(frame, app, chunks[2]);
    render_status_bar(frame, app, chunks[3]);

    if matches!(app.state, AppState::ShowingHelp) {
        render_help_overlay(frame);
    }
}

fn render_title_bar(frame: &mut Frame, app: &App, area: Rect) {
    let title = "  cartcache";
    let badge = format!(" Cart {} ", app.engine.total_quantity());

    let mut spans = vec![Span::styled(title, styles::title_style())];
    let mut used = title.len() + badge.chars().count();

    if !app.online {
        let banner = match app.catalog_age {
            Some(ref age) => format!(" OFFLINE - catalog saved {} ", age),
            None => " OFFLINE ".to_string(),
        };
        used += banner.chars().count() + 2;
        spans.push(Span::raw("  "));
        spans.push(Span::styled(banner, styles::offline_banner_style()));
    }

    spans.push(Span::raw(" ".repeat((area.width as usize).saturating_sub(used + 2))));
    spans.push(Span::styled(badge, styles::badge_style()));

    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(styles::muted_style());

    frame.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
}

fn render_tabs(frame: &mut Frame, app: &App, area: Rect) {
    let Some(catalog) = app.catalog.as_ref() else {
        return;
    };

    let mut spans = vec![Span::raw(" ")];
    for (i, category) in catalog.categories.iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled(" | ", styles::muted_style()));
        }
        let selected = app.view == View::Products && i == app.category_index;
        spans.push(Span::styled(category.label.as_str(), styles::tab_style(selected)));
    }

    spans.push(Span::styled("   ", styles::muted_style()));
    spans.push(Span::styled("[c]art", styles::tab_style(app.view == View::Cart)));

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_main_content(frame: &mut Frame, app: &App, area: Rect) {
    match app.state {
        AppState::Loading => render_message(frame, area, "Loading products...", styles::muted_style()),
        AppState::LoadFailed(ref message) => render_load_failed(frame, area, message),
        _ => match app.view {
            View::Products => render_products(frame, app, area),
            View::Cart => render_cart(frame, app, area),
        },
    }
}

fn render_message(frame: &mut Frame, area: Rect, message: &str, style: ratatui::style::Style) {
    let paragraph = Paragraph::new(Span::styled(message.to_string(), style))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).border_style(styles::border_style(false)));
    frame.render_widget(paragraph, area);
}

fn render_load_failed(frame: &mut Frame, area: Rect, message: &str) {
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(message.to_string(), styles::error_style())),
        Line::from(""),
        Line::from(vec![
            Span::styled("Press ", styles::muted_style()),
            Span::styled("[r]", styles::help_key_style()),
            Span::styled(" to retry", styles::muted_style()),
        ]),
    ];
    let paragraph = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).border_style(styles::border_style(false)));
    frame.render_widget(paragraph, area);
}

fn render_products(frame: &mut Frame, app: &App, area: Rect) {
    let products = app.visible_products();
    let label = app
        .current_category()
        .map(|c| c.label.as_str())
        .unwrap_or("Products");

    let header = Row::new([
        Cell::from("Product"),
        Cell::from("Description"),
        Cell::from("Price"),
        Cell::from("Qty"),
    ])
    .style(styles::title_style())
    .height(1);

    let rows: Vec<Row> = products
        .iter()
        .enumerate()
        .map(|(i, product)| {
            let style = if i == app.product_selection {
                styles::selected_style()
            } else {
                styles::list_item_style()
            };
            let staged = app.engine.staged(&product.id);
            let qty_style = if staged > 0 {
                styles::highlight_style()
            } else {
                styles::muted_style()
            };

            Row::new(vec![
                Cell::from(product.name.clone()),
                Cell::from(truncate_string(&product.description, DESCRIPTION_WIDTH)),
                Cell::from(format!("{:>9}", format_euros(product.price))),
                Cell::from(Span::styled(format!("{:>3}", staged), qty_style)),
            ])
            .style(style)
        })
        .collect();

    let widths = [
        Constraint::Percentage(30),
        Constraint::Fill(1),
        Constraint::Length(10),
        Constraint::Length(4),
    ];

    let title = format!(" {} ({}) ", label, products.len());
    let table = Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .title(title)
                .title_style(styles::muted_style())
                .borders(Borders::ALL)
                .border_style(styles::border_style(true)),
        )
        .row_highlight_style(styles::selected_style());

    let mut state = TableState::default();
    if !products.is_empty() {
        state.select(Some(app.product_selection));
    }
    frame.render_stateful_widget(table, area, &mut state);
}

fn render_cart(frame: &mut Frame, app: &App, area: Rect) {
    let lines = app.cart_lines();
    if lines.is_empty() {
        render_message(frame, area, "Your cart is empty.", styles::muted_style());
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(2)])
        .split(area);

    let header = Row::new([
        Cell::from("#"),
        Cell::from("Product"),
        Cell::from("Unit price"),
        Cell::from("Quantity"),
        Cell::from("Subtotal"),
    ])
    .style(styles::title_style())
    .height(1);

    let rows: Vec<Row> = lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let style = if i == app.cart_selection {
                styles::selected_style()
            } else {
                styles::list_item_style()
            };
            Row::new(vec![
                Cell::from(format!("{}", i + 1)),
                Cell::from(line.name.clone()),
                Cell::from(format!("{:>10}", format_euros(line.price))),
                Cell::from(format!("{:>8}", line.quantity)),
                Cell::from(format!("{:>10}", format_euros(line.subtotal()))),
            ])
            .style(style)
        })
        .collect();

    let widths = [
        Constraint::Length(3),
        Constraint::Fill(1),
        Constraint::Length(11),
        Constraint::Length(9),
        Constraint::Length(11),
    ];

    let table = Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .title(" Cart ")
                .title_style(styles::muted_style())
                .borders(Borders::ALL)
                .border_style(styles::border_style(true)),
        )
        .row_highlight_style(styles::selected_style());

    let mut state = TableState::default();
    state.select(Some(app.cart_selection));
    frame.render_stateful_widget(table, chunks[0], &mut state);

    let summary = app.engine.aggregate();
    let totals = Line::from(vec![
        Span::styled(format!(" Items added: {}", summary.line_count), styles::muted_style()),
        Span::raw("    "),
        Span::styled("Total ", styles::highlight_style()),
        Span::styled(format_euros(summary.total_value), styles::success_style()),
    ]);
    frame.render_widget(Paragraph::new(totals).alignment(Alignment::Right), chunks[1]);
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let shortcuts = match (&app.state, app.view) {
        (AppState::LoadFailed(_), _) => "[r]etry | [q]uit",
        (_, View::Products) => "←/→ category | +/- qty | [a]dd | [c]art | [?] help | [q]uit",
        (_, View::Cart) => "[d]elete | [c] products | [?] help | [q]uit",
    };

    let left_text = match app.status_message {
        Some(ref msg) => format!(" {} ", msg),
        None => String::new(),
    };
    let right_text = format!(" {} ", shortcuts);

    let padding_len = (area.width as usize)
        .saturating_sub(left_text.chars().count())
        .saturating_sub(right_text.chars().count());
    let status_line = Line::from(vec![
        Span::styled(left_text, styles::highlight_style()),
        Span::raw(" ".repeat(padding_len)),
        Span::styled(right_text, styles::muted_style()),
    ]);
    frame.render_widget(Paragraph::new(status_line).style(styles::status_bar_style()), area);
}

fn render_help_overlay(frame: &mut Frame) {
    let area = centered_rect_fixed(44, 18, frame.area());
    frame.render_widget(Clear, area);

    let keys = [
        ("  ←/→       ", "Previous/next category"),
        ("  ↑/↓       ", "Move selection"),
        ("  +/-       ", "Change quantity"),
        ("  a/Enter   ", "Add to cart"),
        ("  c/Tab     ", "Toggle cart view"),
        ("  d/Del     ", "Remove from cart"),
        ("  r         ", "Retry loading the catalog"),
        ("  ?         ", "Show this help"),
        ("  q/Esc     ", "Quit"),
    ];

    let mut lines = vec![
        Line::from(Span::styled(" cartcache", styles::title_style())),
        Line::from(Span::styled(
            format!(" version {}", env!("CARGO_PKG_VERSION")),
            styles::muted_style(),
        )),
        Line::from(""),
        Line::from(Span::styled(" Keys", styles::highlight_style())),
    ];
    lines.extend(keys.iter().map(|(key, desc)| {
        Line::from(vec![
            Span::styled(*key, styles::help_key_style()),
            Span::styled(*desc, styles::help_desc_style()),
        ])
    }));
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(" Press ? or Esc to close", styles::muted_style())));

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn centered_rect_fixed(width: u16, height: u16, r: Rect) -> Rect {
    let x = r.x + (r.width.saturating_sub(width)) / 2;
    let y = r.y + (r.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width.min(r.width), height.min(r.height))
}
