//! Terminal presentation of analysis results.
//!
//! Dependency lists and vulnerability matches are printed as tables; source
//! locations are printed one per line in the compiler-diagnostic shape
//! (`path:line:column: warning: ...`) so editors and CI log parsers pick
//! them up.

use tabled::{settings::Style, Table, Tabled};

use crate::model::{FileLocation, Library, VulnerableUse};

/// Column within the referencing line that the warning points at.
const WARNING_COLUMN: usize = 8;

#[derive(Tabled)]
struct LibraryRow {
    #[tabled(rename = "Platform")]
    platform: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Module")]
    module: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "Direct")]
    direct: String,
}

#[derive(Tabled)]
struct VulnerableRow {
    #[tabled(rename = "Library")]
    library: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "CVE")]
    cve: String,
    #[tabled(rename = "Description")]
    description: String,
}

pub fn print_libraries(libraries: &[Library]) {
    if libraries.is_empty() {
        println!("No dependencies found.");
        return;
    }

    println!("Found {} dependencies:", libraries.len());
    println!();

    let rows: Vec<LibraryRow> = libraries
        .iter()
        .map(|l| LibraryRow {
            platform: l.ecosystem.display_name().to_string(),
            name: truncate(&l.name, 40),
            module: l.module.clone().unwrap_or_else(|| "-".to_string()),
            version: l.version.clone(),
            direct: match l.direct {
                Some(true) => "yes".to_string(),
                Some(false) => "no".to_string(),
                None => "-".to_string(),
            },
        })
        .collect();

    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{}", table);
}

pub fn print_vulnerable(matches: &[VulnerableUse]) {
    if matches.is_empty() {
        println!("No vulnerable library versions in use.");
        return;
    }

    println!();
    println!("Found {} vulnerable library uses:", matches.len());
    println!();

    let rows: Vec<VulnerableRow> = matches
        .iter()
        .map(|m| VulnerableRow {
            library: truncate(&m.library.name, 40),
            version: m.library.version.clone(),
            cve: m.vulnerability.id.clone(),
            description: truncate(
                m.vulnerability.description.as_deref().unwrap_or("-"),
                60,
            ),
        })
        .collect();

    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{}", table);
}

/// One diagnostic line per reference site, in the shape Xcode and most CI
/// log scanners recognize.
pub fn print_locations(locations: &[FileLocation]) {
    for location in locations {
        println!("{}", format_location(location));
    }
}

pub fn format_location(location: &FileLocation) -> String {
    format!(
        "{}:{}:{}: warning: {} (vulnerable version in use)",
        location.path.display(),
        location.line,
        WARNING_COLUMN,
        location.warning
    )
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}
