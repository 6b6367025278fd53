//! `ferp bom` command - bills of materials and cost rollup

use clap::Subcommand;
use console::style;
use miette::{miette, IntoDiagnostic, Result};

use crate::cli::helpers::{material_name, parse_item_spec, truncate_str, Workspace};
use crate::cli::output::{print_serialized, print_tsv};
use crate::cli::{table, GlobalOpts, OutputFormat};
use crate::core::bom_edit::{self, BomEdit};
use crate::core::costing::{compute_breakdown, compute_breakdown_with, CostError};
use crate::core::store::Store;
use crate::entities::{BillOfMaterials, Material};

#[derive(Subcommand, Debug)]
pub enum BomCommands {
    /// Create a bill of materials for a product
    New(NewArgs),

    /// Add components (MAT@N[:QTY], quantity defaults to 1)
    Add(AddArgs),

    /// Remove a component
    Rm(RmArgs),

    /// Change base quantity, reference or component quantities
    Set(SetArgs),

    /// List bills of materials
    List(ListArgs),

    /// Show a bill of materials
    Show(ShowArgs),

    /// Roll up component quantities and costs for a production quantity
    Cost(CostArgs),
}

#[derive(clap::Args, Debug)]
pub struct NewArgs {
    /// Product produced (MAT ID or short ID)
    #[arg(long, short = 'p')]
    pub product: String,

    /// Human label for this BoM
    #[arg(long, short = 'r')]
    pub reference: Option<String>,

    /// Product quantity the component quantities describe
    #[arg(long, default_value_t = 1.0)]
    pub base_qty: f64,

    /// Initial components (MAT@N[:QTY]); repeatable
    #[arg(long = "item", short = 'i')]
    pub items: Vec<String>,
}

#[derive(clap::Args, Debug)]
pub struct AddArgs {
    /// BoM ID or short ID (BOM@N)
    pub bom: String,

    /// Components to add (MAT@N[:QTY])
    #[arg(required = true)]
    pub items: Vec<String>,
}

#[derive(clap::Args, Debug)]
pub struct RmArgs {
    /// BoM ID or short ID (BOM@N)
    pub bom: String,

    /// Component material to remove
    pub item: String,
}

#[derive(clap::Args, Debug)]
pub struct SetArgs {
    /// BoM ID or short ID (BOM@N)
    pub bom: String,

    /// New base quantity
    #[arg(long)]
    pub base_qty: Option<f64>,

    /// New reference (empty string clears it)
    #[arg(long, short = 'r')]
    pub reference: Option<String>,

    /// Replace a component quantity (MAT@N:QTY); repeatable
    #[arg(long = "qty", short = 'q')]
    pub quantities: Vec<String>,
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Only BoMs producing this product
    #[arg(long, short = 'p')]
    pub product: Option<String>,

    /// Show only count
    #[arg(long)]
    pub count: bool,
}

#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// BoM ID or short ID (BOM@N)
    pub bom: String,
}

#[derive(clap::Args, Debug)]
pub struct CostArgs {
    /// BoM ID or short ID (BOM@N)
    pub bom: String,

    /// Quantity of product to produce
    #[arg(long, default_value_t = 1.0)]
    pub qty: f64,

    /// Show every component line, including nested BoMs
    #[arg(long)]
    pub breakdown: bool,
}

pub fn run(cmd: BomCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        BomCommands::New(args) => run_new(args, global),
        BomCommands::Add(args) => run_add(args, global),
        BomCommands::Rm(args) => run_rm(args, global),
        BomCommands::Set(args) => run_set(args, global),
        BomCommands::List(args) => run_list(args, global),
        BomCommands::Show(args) => run_show(args, global),
        BomCommands::Cost(args) => run_cost(args, global),
    }
}

/// Resolve "MAT@N[:QTY]" specs to existing material IDs
fn resolve_items(ws: &Workspace, specs: &[String]) -> Result<Vec<(String, f64)>> {
    specs
        .iter()
        .map(|spec| {
            let (reference, qty) = parse_item_spec(spec)?;
            let id = ws.resolve::<Material>(&reference)?;
            Ok((id, qty))
        })
        .collect()
}

/// Refuse BoMs that would make a product contain itself
///
/// The candidate stands in for its product's BoM so the check covers BoMs
/// not yet saved.
fn check_for_cycles(ws: &Workspace, candidate: &BillOfMaterials) -> Result<()> {
    let result = compute_breakdown(
        candidate,
        1.0,
        |product_id| {
            if product_id == candidate.product_id {
                Ok(Some(candidate.clone()))
            } else {
                ws.store.find_bom_for_product(product_id)
            }
        },
        |material_id| ws.store.fetch_material(material_id),
    );
    match result {
        Err(e @ CostError::CyclicBomReference { .. }) => Err(miette!("{}", e)),
        _ => Ok(()),
    }
}

/// Validate and save an edited BoM, then report it
fn save_edited(ws: &Workspace, bom: &BillOfMaterials, action: &str, global: &GlobalOpts) -> Result<()> {
    check_for_cycles(ws, bom)?;
    ws.store.save_bom(bom).into_diagnostic()?;

    match global.format {
        OutputFormat::Id => println!("{}", bom.id),
        OutputFormat::Json | OutputFormat::Yaml => {
            print_serialized(bom, global.format)?;
        }
        _ => println!(
            "{} {} {} ({} component(s))",
            style("✓").green(),
            action,
            style(ws.short_ids.display(&bom.id.to_string())).cyan(),
            bom.components.len()
        ),
    }
    Ok(())
}

fn run_new(args: NewArgs, global: &GlobalOpts) -> Result<()> {
    let mut ws = Workspace::open()?;
    let product_id = ws.resolve::<Material>(&args.product)?;
    let items = resolve_items(&ws, &args.items)?;

    let mut edits = vec![
        BomEdit::SetBaseQty(args.base_qty),
        BomEdit::SetReference(args.reference),
    ];
    edits.extend(items.into_iter().map(|(material_id, per_unit_qty)| BomEdit::AddComponent {
        material_id,
        per_unit_qty,
    }));

    let draft = BillOfMaterials::new(product_id, ws.config.author());
    let mut bom = bom_edit::apply_all(&draft, edits).map_err(|e| miette!("{}", e))?;
    // A new BoM starts at revision 1 however many edits built it
    bom.entity_revision = 1;

    ws.short_ids.ensure_prefixed(&bom.id.to_string());
    ws.save_short_ids();
    save_edited(&ws, &bom, "Created BoM", global)
}

fn run_add(args: AddArgs, global: &GlobalOpts) -> Result<()> {
    let ws = Workspace::open()?;
    let id = ws.resolve::<BillOfMaterials>(&args.bom)?;
    let bom = ws.store.fetch_bom(&id).into_diagnostic()?;

    let edits = resolve_items(&ws, &args.items)?
        .into_iter()
        .map(|(material_id, per_unit_qty)| BomEdit::AddComponent {
            material_id,
            per_unit_qty,
        });
    let bom = bom_edit::apply_all(&bom, edits).map_err(|e| miette!("{}", e))?;
    save_edited(&ws, &bom, "Updated", global)
}

fn run_rm(args: RmArgs, global: &GlobalOpts) -> Result<()> {
    let ws = Workspace::open()?;
    let id = ws.resolve::<BillOfMaterials>(&args.bom)?;
    let bom = ws.store.fetch_bom(&id).into_diagnostic()?;

    // The component may have been deleted from the catalog; fall back to the raw reference
    let material_id = ws
        .resolve::<Material>(&args.item)
        .unwrap_or_else(|_| args.item.clone());
    let bom = bom_edit::apply(&bom, BomEdit::RemoveComponent { material_id })
        .map_err(|e| miette!("{}", e))?;
    save_edited(&ws, &bom, "Updated", global)
}

fn run_set(args: SetArgs, global: &GlobalOpts) -> Result<()> {
    let ws = Workspace::open()?;
    let id = ws.resolve::<BillOfMaterials>(&args.bom)?;
    let bom = ws.store.fetch_bom(&id).into_diagnostic()?;

    let mut edits = Vec::new();
    if let Some(base_qty) = args.base_qty {
        edits.push(BomEdit::SetBaseQty(base_qty));
    }
    if let Some(reference) = args.reference {
        edits.push(BomEdit::SetReference(Some(reference)));
    }
    for (material_id, per_unit_qty) in resolve_items(&ws, &args.quantities)? {
        edits.push(BomEdit::SetComponentQty {
            material_id,
            per_unit_qty,
        });
    }
    if edits.is_empty() {
        return Err(miette!("Nothing to change. Pass --base-qty, --reference or --qty"));
    }

    let bom = bom_edit::apply_all(&bom, edits).map_err(|e| miette!("{}", e))?;
    save_edited(&ws, &bom, "Updated", global)
}

fn run_list(args: ListArgs, global: &GlobalOpts) -> Result<()> {
    let mut ws = Workspace::open()?;
    let mut boms = ws.store.list_boms().into_diagnostic()?;

    if let Some(product) = &args.product {
        let product_id = ws.resolve::<Material>(product)?;
        boms.retain(|b| b.product_id == product_id);
    }
    boms.sort_by(|a, b| a.created.cmp(&b.created));

    if args.count {
        println!("{}", boms.len());
        return Ok(());
    }

    ws.short_ids.rebuild(boms.iter().map(|b| b.id.to_string()));
    ws.save_short_ids();

    if print_serialized(&boms, global.format)? {
        return Ok(());
    }
    if global.format == OutputFormat::Id {
        for b in &boms {
            println!("{}", b.id);
        }
        return Ok(());
    }
    if boms.is_empty() {
        println!("No bills of materials found.");
        return Ok(());
    }

    let headers = ["SHORT", "PRODUCT", "REFERENCE", "BASE QTY", "LINES"];
    let rows: Vec<Vec<String>> = boms
        .iter()
        .map(|b| {
            vec![
                ws.short_ids.display(&b.id.to_string()),
                truncate_str(&material_name(&ws.store, &b.product_id), 28),
                b.reference.clone().unwrap_or_default(),
                ws.qty(b.base_qty),
                b.components.len().to_string(),
            ]
        })
        .collect();

    if global.format == OutputFormat::Tsv {
        print_tsv(&headers, &rows);
    } else {
        println!("{}", table::render(&headers, &rows));
        println!(
            "\n{} BoM(s). Use {} to reference by short ID.",
            style(boms.len()).cyan(),
            style("BOM@N").cyan()
        );
    }
    Ok(())
}

fn run_show(args: ShowArgs, global: &GlobalOpts) -> Result<()> {
    let ws = Workspace::open()?;
    let id = ws.resolve::<BillOfMaterials>(&args.bom)?;
    let bom = ws.store.fetch_bom(&id).into_diagnostic()?;

    if print_serialized(&bom, global.format)? {
        return Ok(());
    }

    let rows: Vec<Vec<String>> = bom
        .components
        .iter()
        .map(|c| {
            vec![
                ws.short_ids.display(&c.material_id),
                truncate_str(&material_name(&ws.store, &c.material_id), 32),
                ws.qty(c.per_unit_qty),
            ]
        })
        .collect();

    match global.format {
        OutputFormat::Id => println!("{}", bom.id),
        OutputFormat::Tsv => print_tsv(&["MATERIAL", "NAME", "PER UNIT"], &rows),
        _ => {
            println!("{}", style("─".repeat(60)).dim());
            println!("{}: {}", style("ID").bold(), style(bom.id.to_string()).cyan());
            println!(
                "{}: {} ({})",
                style("Product").bold(),
                style(material_name(&ws.store, &bom.product_id)).yellow(),
                ws.short_ids.display(&bom.product_id)
            );
            if let Some(reference) = &bom.reference {
                println!("{}: {}", style("Reference").bold(), reference);
            }
            println!("{}: {}", style("Base Qty").bold(), ws.qty(bom.base_qty));
            println!("{}", style("─".repeat(60)).dim());
            if rows.is_empty() {
                println!("{}", style("No components").dim());
            } else {
                println!("{}", table::render(&["MATERIAL", "NAME", "PER UNIT"], &rows));
            }
            println!("{}", style("─".repeat(60)).dim());
            println!(
                "{}: {} | {}: {} | {}: {}",
                style("Author").dim(),
                bom.author,
                style("Created").dim(),
                bom.created.format("%Y-%m-%d %H:%M"),
                style("Revision").dim(),
                bom.entity_revision
            );
        }
    }
    Ok(())
}

fn run_cost(args: CostArgs, global: &GlobalOpts) -> Result<()> {
    let ws = Workspace::open()?;
    let id = ws.resolve::<BillOfMaterials>(&args.bom)?;
    let bom = ws.store.fetch_bom(&id).into_diagnostic()?;

    let breakdown = compute_breakdown_with(&ws.store, &bom, args.qty).map_err(|e| miette!("{}", e))?;

    if print_serialized(&breakdown, global.format)? {
        return Ok(());
    }

    match global.format {
        OutputFormat::Id => println!("{}", breakdown.bom_id),
        OutputFormat::Tsv => {
            let rows: Vec<Vec<String>> = breakdown
                .flatten()
                .into_iter()
                .map(|(depth, line)| {
                    vec![
                        depth.to_string(),
                        line.material_id.clone(),
                        line.name.clone(),
                        line.scaled_qty.to_string(),
                        line.component_unit_cost.to_string(),
                        line.component_total_cost.to_string(),
                        line.source.to_string(),
                    ]
                })
                .collect();
            print_tsv(
                &["DEPTH", "MATERIAL", "NAME", "QTY", "UNIT_COST", "TOTAL", "SOURCE"],
                &rows,
            );
        }
        _ => {
            println!(
                "{} {} ({})",
                style("BoM:").bold(),
                style(ws.short_ids.display(&breakdown.bom_id)).cyan(),
                bom.reference.as_deref().unwrap_or("no reference")
            );
            println!(
                "{} {}",
                style("Product:").bold(),
                style(&breakdown.product_name).yellow()
            );
            println!(
                "{} {}",
                style("Production Qty:").bold(),
                style(ws.qty(breakdown.produced_qty)).yellow()
            );
            println!();

            if args.breakdown && !breakdown.components.is_empty() {
                let rows: Vec<Vec<String>> = breakdown
                    .flatten()
                    .into_iter()
                    .map(|(depth, line)| {
                        vec![
                            format!("{}{}", "  ".repeat(depth), ws.short_ids.display(&line.material_id)),
                            truncate_str(&line.name, 26),
                            ws.qty(line.scaled_qty),
                            ws.money(line.component_unit_cost),
                            ws.money(line.component_total_cost),
                            line.source.to_string(),
                        ]
                    })
                    .collect();
                println!(
                    "{}",
                    table::render(&["ITEM", "NAME", "QTY", "UNIT", "LINE", "SOURCE"], &rows)
                );
                println!();
            }

            println!(
                "{} {}",
                style("Rollup per Unit:").bold(),
                ws.money(breakdown.boms_unit_cost)
            );
            println!(
                "{} {}",
                style("BoM Cost:").green().bold(),
                ws.money(breakdown.boms_cost)
            );
            println!(
                "{} {} ({} x {})",
                style("Product Cost:").bold(),
                ws.money(breakdown.product_total_cost),
                ws.qty(breakdown.produced_qty),
                ws.money(breakdown.product_unit_cost)
            );

            let variance = breakdown.rollup_variance();
            if !variance.is_zero() {
                println!(
                    "{} {}",
                    style("Variance:").yellow().bold(),
                    style(format!(
                        "{} (rollup minus catalog cost)",
                        ws.money(variance)
                    ))
                    .dim()
                );
            }
        }
    }
    Ok(())
}
