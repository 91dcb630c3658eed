//! `hnpipe list` - print stored items

use anyhow::{Context, Result};
use clap::Args;
use comfy_table::{Cell, Color, ContentArrangement, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};
use hnpipe_core::{Item, ItemKind};

use crate::config::Config;

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only show items of this kind
    #[arg(long, value_parser = parse_kind)]
    pub kind: Option<ItemKind>,

    /// Maximum number of items to show
    #[arg(short = 'n', long, default_value_t = 20)]
    pub limit: usize,
}

fn parse_kind(s: &str) -> Result<ItemKind, String> {
    ItemKind::from_name(s).ok_or_else(|| format!("expected story, job or other, got {s}"))
}

pub fn run(args: ListArgs, config: &Config) -> Result<()> {
    let store = super::open_store(config)?;
    let items = store
        .items(args.kind, args.limit)
        .context("Failed to query items")?;

    if items.is_empty() {
        eprintln!("No items stored");
        return Ok(());
    }
    println!("{}", format_items(&items));
    Ok(())
}

fn format_items(items: &[Item]) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("ID").fg(Color::Cyan),
            Cell::new("Kind").fg(Color::Cyan),
            Cell::new("Score").fg(Color::Cyan),
            Cell::new("Title").fg(Color::Cyan),
            Cell::new("By").fg(Color::Cyan),
            Cell::new("Created").fg(Color::Cyan),
        ]);

    for item in items {
        table.add_row(vec![
            item.id.to_string(),
            item.kind.to_string(),
            item.score.to_string(),
            item.title.clone(),
            item.created_by.clone(),
            item.created_at.format("%Y-%m-%d %H:%M").to_string(),
        ]);
    }
    table.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_parser() {
        assert_eq!(parse_kind("job"), Ok(ItemKind::Job));
        assert!(parse_kind("comment").is_err());
    }

    #[test]
    fn table_lists_every_item() {
        let mut story = Item::new(8863, ItemKind::Story);
        story.title = "My YC app: Dropbox".to_string();
        let job = Item::new(192327, ItemKind::Job);

        let out = format_items(&[story, job]);
        assert!(out.contains("8863"));
        assert!(out.contains("Dropbox"));
        assert!(out.contains("192327"));
        assert!(out.contains("1970-01-01"));
    }
}
