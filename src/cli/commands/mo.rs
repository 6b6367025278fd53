//! `ferp mo` command - manufacturing orders

use clap::Subcommand;
use console::style;
use miette::{miette, IntoDiagnostic, Result};

use crate::cli::helpers::{confirm, material_name, truncate_str, Workspace};
use crate::cli::output::{print_serialized, print_tsv};
use crate::cli::{table, GlobalOpts, OutputFormat, StatusFilter};
use crate::core::manufacturing::{
    allowed_transitions, CreateOrder, ManufacturingOrderStateMachine, MoAction, MoWorkflowConfig,
    Transition,
};
use crate::core::store::Store;
use crate::entities::{BillOfMaterials, ManufacturingOrder, Material, MoState, MoStatus};

#[derive(Subcommand, Debug)]
pub enum MoCommands {
    /// Create a draft manufacturing order
    New(NewArgs),

    /// List manufacturing orders
    List(ListArgs),

    /// Show an order with its components
    Show(ShowArgs),

    /// Move an order to its next stage
    Advance(IdArgs),

    /// Cancel an order
    Cancel(CancelArgs),

    /// Point a draft order at a different product or BoM
    Relink(RelinkArgs),

    /// Change the quantity of a draft order
    Qty(QtyArgs),
}

#[derive(clap::Args, Debug)]
pub struct NewArgs {
    /// Product to make (MAT ID or short ID)
    #[arg(long, short = 'p')]
    pub product: String,

    /// BoM to use (default: the product's oldest BoM)
    #[arg(long, short = 'b')]
    pub bom: Option<String>,

    /// Quantity to produce
    #[arg(long, short = 'q')]
    pub qty: f64,

    /// Order reference (default: generated)
    #[arg(long, short = 'r')]
    pub reference: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Filter by status
    #[arg(long, short = 's', default_value_t = StatusFilter::All)]
    pub status: StatusFilter,

    /// Filter by product (MAT ID or short ID)
    #[arg(long, short = 'p')]
    pub product: Option<String>,

    /// Show only count
    #[arg(long)]
    pub count: bool,
}

#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// Order ID or short ID (MO@N)
    pub id: String,
}

#[derive(clap::Args, Debug)]
pub struct IdArgs {
    /// Order ID or short ID (MO@N)
    pub id: String,
}

#[derive(clap::Args, Debug)]
pub struct CancelArgs {
    /// Order ID or short ID (MO@N)
    pub id: String,

    /// Skip confirmation
    #[arg(long, short = 'y')]
    pub yes: bool,
}

#[derive(clap::Args, Debug)]
pub struct RelinkArgs {
    /// Order ID or short ID (MO@N)
    pub id: String,

    /// New product (default: unchanged)
    #[arg(long, short = 'p')]
    pub product: Option<String>,

    /// New BoM (default: the product's oldest BoM)
    #[arg(long, short = 'b')]
    pub bom: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct QtyArgs {
    /// Order ID or short ID (MO@N)
    pub id: String,

    /// New quantity
    pub qty: f64,
}

pub fn run(cmd: MoCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        MoCommands::New(args) => run_new(args, global),
        MoCommands::List(args) => run_list(args, global),
        MoCommands::Show(args) => run_show(args, global),
        MoCommands::Advance(args) => run_action(&args.id, MoAction::Advance, global),
        MoCommands::Cancel(args) => run_cancel(args, global),
        MoCommands::Relink(args) => run_relink(args, global),
        MoCommands::Qty(args) => run_action(&args.id, MoAction::SetQuantity(args.qty), global),
    }
}

fn state_machine(ws: &Workspace) -> ManufacturingOrderStateMachine<'_, crate::core::ProjectStore> {
    ManufacturingOrderStateMachine::new(&ws.store, MoWorkflowConfig::from_config(&ws.config))
}

/// The BoM given on the command line, or the product's oldest one
fn resolve_bom(ws: &Workspace, bom: Option<&str>, product_id: &str) -> Result<String> {
    match bom {
        Some(reference) => ws.resolve::<BillOfMaterials>(reference),
        None => ws
            .store
            .find_bom_for_product(product_id)
            .into_diagnostic()?
            .map(|b| b.id.to_string())
            .ok_or_else(|| {
                miette!(
                    "No BoM produces {}. Create one with 'ferp bom new --product {}'",
                    material_name(&ws.store, product_id),
                    ws.short_ids.display(product_id)
                )
            }),
    }
}

fn styled_state(order: &ManufacturingOrder) -> String {
    let label = format!("{} {}", order.state.code(), order.state);
    if order.is_cancelled() {
        return style(format!("{} (cancelled)", label)).red().to_string();
    }
    match order.state {
        MoState::Draft => style(label).dim().to_string(),
        MoState::Confirmed | MoState::Ready => style(label).yellow().to_string(),
        MoState::InProgress => style(label).cyan().to_string(),
        MoState::Done => style(label).green().to_string(),
    }
}

/// Print an order after a change
fn report(ws: &Workspace, order: &ManufacturingOrder, action: &str, global: &GlobalOpts) -> Result<()> {
    if print_serialized(order, global.format)? {
        return Ok(());
    }
    match global.format {
        OutputFormat::Id => println!("{}", order.id),
        OutputFormat::Tsv => print_tsv(
            &["ID", "REFERENCE", "STATE", "STATUS", "REVISION"],
            &[vec![
                order.id.to_string(),
                order.reference.clone(),
                order.state.code().to_string(),
                order.status.to_string(),
                order.entity_revision.to_string(),
            ]],
        ),
        _ => {
            println!(
                "{} {} {} ({})",
                style("✓").green(),
                action,
                style(ws.short_ids.display(&order.id.to_string())).cyan(),
                order.reference
            );
            println!("   {}: {}", style("State").dim(), styled_state(order));
            let short: Vec<String> = order
                .unavailable_components()
                .map(|c| material_name(&ws.store, &c.material_id))
                .collect();
            if !short.is_empty() && order.status == MoStatus::Process {
                println!(
                    "   {} Short of: {}",
                    style("!").yellow(),
                    style(short.join(", ")).yellow()
                );
            }
        }
    }
    Ok(())
}

fn run_new(args: NewArgs, global: &GlobalOpts) -> Result<()> {
    let mut ws = Workspace::open()?;
    let product_id = ws.resolve::<Material>(&args.product)?;
    let bom_id = resolve_bom(&ws, args.bom.as_deref(), &product_id)?;

    let order = state_machine(&ws)
        .create_and_persist(CreateOrder {
            product_id,
            bom_id,
            qty: args.qty,
            reference: args.reference,
            author: ws.config.author(),
        })
        .map_err(|e| miette!("{}", e))?;

    ws.short_ids.ensure_prefixed(&order.id.to_string());
    ws.save_short_ids();
    report(&ws, &order, "Created order", global)
}

fn run_list(args: ListArgs, global: &GlobalOpts) -> Result<()> {
    let mut ws = Workspace::open()?;
    let mut orders = ws.store.list_manufacturing_orders().into_diagnostic()?;

    let product_id = args
        .product
        .as_deref()
        .map(|p| ws.resolve::<Material>(p))
        .transpose()?;
    orders.retain(|o| args.status.matches(o));
    if let Some(product_id) = &product_id {
        orders.retain(|o| &o.product_id == product_id);
    }
    orders.sort_by(|a, b| a.created.cmp(&b.created));

    if args.count {
        println!("{}", orders.len());
        return Ok(());
    }

    ws.short_ids.rebuild(orders.iter().map(|o| o.id.to_string()));
    ws.save_short_ids();

    if print_serialized(&orders, global.format)? {
        return Ok(());
    }
    if global.format == OutputFormat::Id {
        for o in &orders {
            println!("{}", o.id);
        }
        return Ok(());
    }
    if orders.is_empty() {
        println!("No manufacturing orders found.");
        return Ok(());
    }

    let headers = ["SHORT", "REFERENCE", "PRODUCT", "QTY", "STATE", "STATUS"];
    let rows: Vec<Vec<String>> = orders
        .iter()
        .map(|o| {
            vec![
                ws.short_ids.display(&o.id.to_string()),
                o.reference.clone(),
                truncate_str(&material_name(&ws.store, &o.product_id), 24),
                ws.qty(o.qty),
                format!("{} {}", o.state.code(), o.state),
                o.status.to_string(),
            ]
        })
        .collect();

    if global.format == OutputFormat::Tsv {
        print_tsv(&headers, &rows);
    } else {
        println!("{}", table::render(&headers, &rows));
        println!(
            "\n{} order(s). Use {} to reference by short ID.",
            style(orders.len()).cyan(),
            style("MO@N").cyan()
        );
    }
    Ok(())
}

fn run_show(args: ShowArgs, global: &GlobalOpts) -> Result<()> {
    let ws = Workspace::open()?;
    let id = ws.resolve::<ManufacturingOrder>(&args.id)?;
    let order = ws.store.fetch_manufacturing_order(&id).into_diagnostic()?;

    if print_serialized(&order, global.format)? {
        return Ok(());
    }

    let rows: Vec<Vec<String>> = order
        .components
        .iter()
        .map(|c| {
            vec![
                ws.short_ids.display(&c.material_id),
                truncate_str(&material_name(&ws.store, &c.material_id), 28),
                ws.qty(c.required_qty),
                ws.qty(c.consumed_qty),
                if c.available { "yes" } else { "no" }.to_string(),
            ]
        })
        .collect();
    let headers = ["MATERIAL", "NAME", "REQUIRED", "CONSUMED", "AVAILABLE"];

    match global.format {
        OutputFormat::Id => println!("{}", order.id),
        OutputFormat::Tsv => print_tsv(&headers, &rows),
        _ => {
            println!("{}", style("─".repeat(60)).dim());
            println!("{}: {}", style("ID").bold(), style(order.id.to_string()).cyan());
            println!("{}: {}", style("Reference").bold(), style(&order.reference).yellow());
            println!(
                "{}: {} ({})",
                style("Product").bold(),
                material_name(&ws.store, &order.product_id),
                ws.short_ids.display(&order.product_id)
            );
            println!("{}: {}", style("BoM").bold(), ws.short_ids.display(&order.bom_id));
            println!("{}: {}", style("Quantity").bold(), ws.qty(order.qty));
            println!("{}: {}", style("State").bold(), styled_state(&order));

            let next: Vec<String> = allowed_transitions(&order)
                .into_iter()
                .map(|t| match t {
                    Transition::Advance { to } => format!("advance → {}", to),
                    Transition::Cancel => "cancel".to_string(),
                })
                .collect();
            if !next.is_empty() {
                println!("{}: {}", style("Next").bold(), style(next.join(", ")).dim());
            }

            println!("{}", style("─".repeat(60)).dim());
            if rows.is_empty() {
                println!("{}", style("No components").dim());
            } else {
                println!("{}", table::render(&headers, &rows));
            }
            println!("{}", style("─".repeat(60)).dim());
            println!(
                "{}: {} | {}: {} | {}: {}",
                style("Author").dim(),
                order.author,
                style("Created").dim(),
                order.created.format("%Y-%m-%d %H:%M"),
                style("Revision").dim(),
                order.entity_revision
            );
        }
    }
    Ok(())
}

fn run_action(reference: &str, action: MoAction, global: &GlobalOpts) -> Result<()> {
    let ws = Workspace::open()?;
    let id = ws.resolve::<ManufacturingOrder>(reference)?;

    let label = match &action {
        MoAction::Advance => "Advanced",
        MoAction::Cancel => "Cancelled",
        MoAction::Relink { .. } => "Relinked",
        MoAction::SetQuantity(_) => "Updated",
    };
    let order = state_machine(&ws)
        .transition(&id, action)
        .map_err(|e| miette!("{}", e))?;
    report(&ws, &order, label, global)
}

fn run_cancel(args: CancelArgs, global: &GlobalOpts) -> Result<()> {
    let ws = Workspace::open()?;
    let id = ws.resolve::<ManufacturingOrder>(&args.id)?;
    let order = ws.store.fetch_manufacturing_order(&id).into_diagnostic()?;

    let prompt = format!(
        "Cancel {} ({} x {})? This cannot be undone",
        order.reference,
        ws.qty(order.qty),
        material_name(&ws.store, &order.product_id)
    );
    if !confirm(&prompt, args.yes)? {
        println!("Aborted.");
        return Ok(());
    }

    run_action(&id, MoAction::Cancel, global)
}

fn run_relink(args: RelinkArgs, global: &GlobalOpts) -> Result<()> {
    let ws = Workspace::open()?;
    let id = ws.resolve::<ManufacturingOrder>(&args.id)?;
    let order = ws.store.fetch_manufacturing_order(&id).into_diagnostic()?;

    if args.product.is_none() && args.bom.is_none() {
        return Err(miette!("Nothing to change. Pass --product and/or --bom"));
    }

    let product_id = match &args.product {
        Some(product) => ws.resolve::<Material>(product)?,
        None => order.product_id.clone(),
    };
    let bom_id = resolve_bom(&ws, args.bom.as_deref(), &product_id)?;

    run_action(
        &id,
        MoAction::Relink { product_id, bom_id },
        global,
    )
}
