//! `ferp mat` command - catalog materials and products

use clap::Subcommand;
use console::style;
use miette::{miette, IntoDiagnostic, Result};
use rust_decimal::Decimal;

use crate::cli::helpers::{truncate_str, Workspace};
use crate::cli::output::{print_serialized, print_tsv};
use crate::cli::{table, GlobalOpts, OutputFormat};
use crate::core::store::Store;
use crate::entities::Material;

#[derive(Subcommand, Debug)]
pub enum MatCommands {
    /// Add a material or product to the catalog
    New(NewArgs),

    /// List catalog entries
    List(ListArgs),

    /// Show a material's details
    Show(ShowArgs),

    /// Set the quantity on hand
    Stock(StockArgs),
}

#[derive(clap::Args, Debug)]
pub struct NewArgs {
    /// Display name
    #[arg(long, short = 'n')]
    pub name: String,

    /// Internal reference code
    #[arg(long = "ref", short = 'r')]
    pub internal_reference: Option<String>,

    /// Stated cost per unit
    #[arg(long, short = 'c')]
    pub cost: Decimal,

    /// Sales price per unit
    #[arg(long, short = 'p')]
    pub price: Option<Decimal>,

    /// Unit of measure
    #[arg(long)]
    pub uom: Option<String>,

    /// Quantity on hand (omit for untracked stock)
    #[arg(long)]
    pub on_hand: Option<f64>,
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Search in name and reference
    #[arg(long)]
    pub search: Option<String>,

    /// Show only count
    #[arg(long)]
    pub count: bool,
}

#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// Material ID or short ID (MAT@N)
    pub id: String,
}

#[derive(clap::Args, Debug)]
pub struct StockArgs {
    /// Material ID or short ID (MAT@N)
    pub id: String,

    /// New quantity on hand
    pub on_hand: f64,
}

pub fn run(cmd: MatCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        MatCommands::New(args) => run_new(args, global),
        MatCommands::List(args) => run_list(args, global),
        MatCommands::Show(args) => run_show(args, global),
        MatCommands::Stock(args) => run_stock(args, global),
    }
}

fn validate_on_hand(on_hand: f64) -> Result<f64> {
    if on_hand.is_finite() && on_hand >= 0.0 {
        Ok(on_hand)
    } else {
        Err(miette!("On-hand quantity must be zero or more, got {}", on_hand))
    }
}

fn run_new(args: NewArgs, global: &GlobalOpts) -> Result<()> {
    let mut ws = Workspace::open()?;

    if args.name.trim().is_empty() {
        return Err(miette!("Material name cannot be empty"));
    }
    if args.cost.is_sign_negative() {
        return Err(miette!("Unit cost cannot be negative, got {}", args.cost));
    }

    let mut material = Material::new(args.name.trim().to_string(), args.cost, ws.config.author());
    material.internal_reference = args.internal_reference;
    material.sales_price = args.price.unwrap_or(Decimal::ZERO);
    material.uom = args.uom;
    material.on_hand = args.on_hand.map(validate_on_hand).transpose()?;

    ws.store.save_material(&material).into_diagnostic()?;
    let alias = ws.short_ids.ensure_prefixed(&material.id.to_string());
    ws.save_short_ids();

    match global.format {
        OutputFormat::Id => println!("{}", material.id),
        OutputFormat::Json | OutputFormat::Yaml => {
            print_serialized(&material, global.format)?;
        }
        _ => {
            println!(
                "{} Created material {}",
                style("✓").green(),
                style(&alias).cyan()
            );
            println!(
                "   {} | {}",
                style(&material.name).yellow(),
                ws.money(material.unit_cost)
            );
        }
    }
    Ok(())
}

fn run_list(args: ListArgs, global: &GlobalOpts) -> Result<()> {
    let mut ws = Workspace::open()?;
    let mut materials = ws.store.list_materials().into_diagnostic()?;

    if let Some(search) = &args.search {
        let needle = search.to_lowercase();
        materials.retain(|m| {
            m.name.to_lowercase().contains(&needle)
                || m.internal_reference
                    .as_ref()
                    .is_some_and(|r| r.to_lowercase().contains(&needle))
        });
    }
    materials.sort_by(|a, b| a.name.cmp(&b.name));

    if args.count {
        println!("{}", materials.len());
        return Ok(());
    }

    ws.short_ids
        .rebuild(materials.iter().map(|m| m.id.to_string()));
    ws.save_short_ids();

    if print_serialized(&materials, global.format)? {
        return Ok(());
    }

    if global.format == OutputFormat::Id {
        for m in &materials {
            println!("{}", m.id);
        }
        return Ok(());
    }

    if materials.is_empty() {
        println!("No materials found.");
        return Ok(());
    }

    let headers = ["SHORT", "NAME", "REF", "COST", "PRICE", "ON HAND"];
    let rows: Vec<Vec<String>> = materials
        .iter()
        .map(|m| {
            vec![
                ws.short_ids.display(&m.id.to_string()),
                truncate_str(&m.name, 32),
                m.internal_reference.clone().unwrap_or_default(),
                ws.money(m.unit_cost),
                ws.money(m.sales_price),
                m.on_hand.map(|q| ws.qty(q)).unwrap_or_else(|| "-".to_string()),
            ]
        })
        .collect();

    if global.format == OutputFormat::Tsv {
        print_tsv(&headers, &rows);
    } else {
        println!("{}", table::render(&headers, &rows));
        println!(
            "\n{} material(s). Use {} to reference by short ID.",
            style(materials.len()).cyan(),
            style("MAT@N").cyan()
        );
    }
    Ok(())
}

fn run_show(args: ShowArgs, global: &GlobalOpts) -> Result<()> {
    let ws = Workspace::open()?;
    let id = ws.resolve::<Material>(&args.id)?;
    let material = ws.store.fetch_material(&id).into_diagnostic()?;

    if print_serialized(&material, global.format)? {
        return Ok(());
    }

    match global.format {
        OutputFormat::Id => println!("{}", material.id),
        OutputFormat::Tsv => print_tsv(
            &["ID", "NAME", "COST", "PRICE"],
            &[vec![
                material.id.to_string(),
                material.name.clone(),
                material.unit_cost.to_string(),
                material.sales_price.to_string(),
            ]],
        ),
        _ => {
            println!("{}", style("─".repeat(60)).dim());
            println!(
                "{}: {}",
                style("ID").bold(),
                style(material.id.to_string()).cyan()
            );
            println!("{}: {}", style("Name").bold(), style(&material.name).yellow());
            if let Some(reference) = &material.internal_reference {
                println!("{}: {}", style("Reference").bold(), reference);
            }
            println!("{}: {}", style("Unit Cost").bold(), ws.money(material.unit_cost));
            println!("{}: {}", style("Sales Price").bold(), ws.money(material.sales_price));
            if let Some(uom) = &material.uom {
                println!("{}: {}", style("UoM").bold(), uom);
            }
            match material.on_hand {
                Some(q) => println!("{}: {}", style("On Hand").bold(), ws.qty(q)),
                None => println!("{}: {}", style("On Hand").bold(), style("untracked").dim()),
            }
            println!("{}", style("─".repeat(60)).dim());
            println!(
                "{}: {} | {}: {} | {}: {}",
                style("Author").dim(),
                material.author,
                style("Created").dim(),
                material.created.format("%Y-%m-%d %H:%M"),
                style("Revision").dim(),
                material.entity_revision
            );
        }
    }
    Ok(())
}

fn run_stock(args: StockArgs, global: &GlobalOpts) -> Result<()> {
    let ws = Workspace::open()?;
    let id = ws.resolve::<Material>(&args.id)?;
    let mut material = ws.store.fetch_material(&id).into_diagnostic()?;

    material.on_hand = Some(validate_on_hand(args.on_hand)?);
    material.entity_revision += 1;
    ws.store.save_material(&material).into_diagnostic()?;

    match global.format {
        OutputFormat::Id => println!("{}", material.id),
        _ => println!(
            "{} {} on hand: {}",
            style("✓").green(),
            style(&material.name).yellow(),
            ws.qty(args.on_hand)
        ),
    }
    Ok(())
}
