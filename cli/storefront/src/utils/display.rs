//! Terminal rendering of catalog items.

use std::fmt::{self, Display, Write as _};

use crossterm::style::Stylize;
use crossterm::tty::IsTty;
use itertools::Itertools;
use storefront_sdk::models::browse::{Mode, QueryState};
use storefront_sdk::models::suggestions::Suggestion;
use storefront_sdk::providers::catalog::CatalogItem;

const DEFAULT_DESCRIPTION: &str = "<no description provided>";

/// Whether stdout is an interactive terminal that understands styling.
pub fn stdout_is_styled() -> bool {
    std::io::stdout().is_tty()
}

/// A list of items, one line each.
pub struct DisplayItems<'a> {
    items: &'a [CatalogItem],
    styled: bool,
}

impl<'a> DisplayItems<'a> {
    pub fn new(items: &'a [CatalogItem], styled: bool) -> Self {
        Self { items, styled }
    }
}

impl Display for DisplayItems<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id_width = self
            .items
            .iter()
            .map(|item| item.id.as_str().len())
            .max()
            .unwrap_or_default();
        let name_width = self
            .items
            .iter()
            .map(|item| item.name.chars().count())
            .max()
            .unwrap_or_default();

        let mut items = self.items.iter().peekable();
        while let Some(item) = items.next() {
            let name = format!("{:<name_width$}", item.name);
            let name = if self.styled {
                name.bold().to_string()
            } else {
                name
            };
            let stock = if item.in_stock { "" } else { "  (out of stock)" };
            write!(
                f,
                "{id:<id_width$}  {name}  {price:>9}  {category}{stock}",
                id = item.id,
                price = format_price(item.price),
                category = item.category,
            )?;
            // Only print a newline if there are more items to print
            if items.peek().is_some() {
                writeln!(f)?;
            }
        }
        Ok(())
    }
}

/// All fields of a single item.
pub struct DisplayItem<'a>(pub &'a CatalogItem);

impl Display for DisplayItem<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let item = self.0;
        let description = if item.description.is_empty() {
            DEFAULT_DESCRIPTION
        } else {
            &item.description
        };

        writeln!(f, "{} - {}", item.name, description)?;
        writeln!(f)?;
        writeln!(f, "    id:       {}", item.id)?;
        writeln!(f, "    price:    {}", format_price(item.price))?;
        writeln!(f, "    category: {}", item.category)?;
        write!(
            f,
            "    in stock: {}",
            if item.in_stock { "yes" } else { "no" }
        )?;
        if let Some(rating) = item.rating {
            write!(f, "\n    rating:   {rating:.1}")?;
            if let Some(reviews) = item.reviews {
                write!(f, " ({reviews} reviews)")?;
            }
        }
        if let Some(image) = &item.image {
            write!(f, "\n    image:    {image}")?;
        }
        if let Some(created_at) = item.created_at {
            write!(f, "\n    created:  {}", created_at.format("%Y-%m-%d %H:%M"))?;
        }
        Ok(())
    }
}

pub fn format_price(price: f64) -> String {
    format!("${price:.2}")
}

/// A one line summary of how much of the result set is shown.
pub fn results_summary(state: &QueryState) -> String {
    let mut summary = match state.mode() {
        Mode::Browse => format!(
            "Showing {} of {} items",
            state.items().len(),
            state.total_items()
        ),
        Mode::Search => format!(
            "Showing {} of {} results for '{}'",
            state.items().len(),
            state.total_items(),
            state.search_query()
        ),
    };
    let _ = write!(summary, " (sorted by {})", state.sort_by());
    if state.has_next_page() {
        summary.push_str(", more available");
    }
    summary
}

pub fn format_suggestions(suggestions: &[Suggestion]) -> String {
    suggestions
        .iter()
        .map(|suggestion| format!("  {} ({})", suggestion.text, suggestion.kind))
        .join("\n")
}
