use propvest::{config::scenario_from_lookup, finance::compute_breakdown, PropertyListing};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    dotenv::dotenv().ok();

    let (assumptions, expenses) = scenario_from_lookup(|key| std::env::var(key).ok())?;
    let listing = PropertyListing::sample();

    info!(
        purchase_price = assumptions.purchase_price,
        occupancy_rate = assumptions.occupancy_rate,
        "Analyzing scenario"
    );

    let b = match compute_breakdown(&assumptions, &expenses) {
        Ok(b) => b,
        Err(e) => {
            error!("Analysis failed: {}", e);
            eprintln!("Analysis failed: {}", e);
            return Err(e.into());
        }
    };
    let r = &b.result;

    println!("\n=== {} ({}, {}) ===", listing.address, listing.city, listing.state);
    println!("Purchase price:      {:>12.2}", assumptions.purchase_price);
    println!("Loan amount:         {:>12.2}", b.loan_amount);
    println!("Initial investment:  {:>12.2}", r.initial_investment);
    println!();
    println!("Monthly income:      {:>12.2}", r.monthly_income);
    println!("  Mortgage:          {:>12.2}", r.monthly_mortgage);
    println!("  Property tax:      {:>12.2}", b.monthly_tax);
    println!("  Insurance:         {:>12.2}", b.monthly_insurance);
    println!("  HOA:               {:>12.2}", expenses.hoa_monthly);
    println!("  Utilities:         {:>12.2}", expenses.utilities_monthly);
    println!("  Maintenance:       {:>12.2}", expenses.maintenance_monthly);
    println!("  Management:        {:>12.2}", b.monthly_management);
    println!("  Other:             {:>12.2}", expenses.other_monthly);
    println!("Total expenses:      {:>12.2}", r.total_monthly_expenses);
    println!();
    println!("Cash flow / month:   {:>+12.2}", r.cash_flow);
    println!("Annual NOI:          {:>12.2}", b.annual_noi);
    println!("Cap rate:            {:>11.2}%", r.cap_rate);
    println!("Cash-on-cash ROI:    {:>11.2}%", r.cash_on_cash_roi);

    Ok(())
}
