use comfy_table::{Attribute, Cell, ContentArrangement, Table};
use crossterm::style::Stylize;
use datagrid::{GridPhase, GridSnapshot, Row};

/// Column headers to show: declared columns, or the first row's fields
fn display_columns(snapshot: &GridSnapshot) -> Vec<(String, String)> {
    if !snapshot.headers.is_empty() {
        // Precedence numbers only matter with more than one sort key
        let multi_sort = snapshot
            .headers
            .iter()
            .filter(|h| h.precedence.is_some())
            .count()
            > 1;
        return snapshot
            .headers
            .iter()
            .map(|h| {
                let label = match h.precedence {
                    Some(p) if multi_sort => format!("{} {}{}", h.header, h.indicator, p),
                    Some(_) => format!("{} {}", h.header, h.indicator),
                    None => h.header.clone(),
                };
                (h.property.clone(), label)
            })
            .collect();
    }

    snapshot
        .rows
        .first()
        .map(|row: &Row| {
            row.field_names()
                .map(|name| (name.to_string(), name.to_string()))
                .collect()
        })
        .unwrap_or_default()
}

pub fn render_grid(snapshot: &GridSnapshot) {
    match snapshot.phase {
        GridPhase::Initializing => {
            println!("{}", "Grid not loaded yet.".dark_grey());
            return;
        }
        GridPhase::Loading => {
            println!("{}", "Loading...".cyan());
            return;
        }
        GridPhase::Error => {
            let reason = snapshot.error.as_deref().unwrap_or("unknown error");
            eprintln!("{}", format!("Failed to load data: {reason}").red());
            eprintln!("{}", "Type `retry` to try again.".yellow());
            return;
        }
        GridPhase::Ready => {}
    }

    if !snapshot.search_text.is_empty() {
        println!("{}", format!("Search: {}", snapshot.search_text).cyan());
    }

    if snapshot.empty_visible {
        println!("{}", "No results found.".yellow());
        return;
    }

    let columns = display_columns(snapshot);
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(
        columns
            .iter()
            .map(|(_, label)| Cell::new(label).add_attribute(Attribute::Bold)),
    );

    for row in &snapshot.rows {
        table.add_row(
            columns
                .iter()
                .map(|(property, _)| row.get(property).to_string()),
        );
    }

    println!("{table}");

    let counters = snapshot.counters;
    let mut footer = format!(
        "Showing {}-{} of {} | page {}/{} | {} per page",
        counters.start,
        counters.end,
        counters.total,
        snapshot.current_page + 1,
        snapshot.max_page + 1,
        snapshot.page_size
    );
    if counters.total != counters.fetched {
        footer.push_str(&format!(" | {} fetched", counters.fetched));
    }
    println!("{}", footer.green());
}

/// Controls line, mirroring the enabled/disabled state of the buttons
pub fn render_controls(snapshot: &GridSnapshot) {
    let controls = snapshot.controls;
    let flag = |name: &str, enabled: bool| {
        if enabled {
            name.green().to_string()
        } else {
            name.dark_grey().to_string()
        }
    };

    println!(
        "{} {} {} {} {} {} {}",
        flag("[first]", controls.first),
        flag("[prev]", controls.previous),
        flag("[next]", controls.next),
        flag("[last]", controls.last),
        flag("[size]", controls.page_size),
        flag("[search]", controls.search),
        flag("[retry]", controls.retry),
    );
}
