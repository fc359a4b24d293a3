use admission_allocator::allocator::{AllocationOutcome, DepartmentAllocator};
use admission_allocator::models::{CapacityMode, Channel, Config};
use admission_allocator::reader::RosterReader;
use anyhow::Result;
use clap::{Arg, Command};
use std::fs;
use std::path::Path;

fn main() -> Result<()> {
    let matches = Command::new("admission-allocator")
        .version("1.0")
        .about("Allocates students to departments by ranked preferences")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("config.toml"),
        )
        .arg(
            Arg::new("input")
                .short('i')
                .long("input")
                .value_name("FILE")
                .help("Roster CSV path (overrides the configured input_file)"),
        )
        .arg(
            Arg::new("margin")
                .short('m')
                .long("margin")
                .value_name("POINTS")
                .help("Staff-children score margin (overrides the configured value)"),
        )
        .get_matches();

    let config_file = matches.get_one::<String>("config").unwrap();

    // Load or create configuration
    let mut config = if Path::new(config_file).exists() {
        println!("📋 Loading configuration from: {}", config_file);
        Config::load_from_file(config_file)?
    } else {
        println!("📝 Creating default configuration file: {}", config_file);
        let default_config = Config::default();
        default_config.save_to_file(config_file)?;
        println!(
            "⚠️  Please edit {} (input file, capacity mode, margin), then run the program again.",
            config_file
        );
        return Ok(());
    };

    if let Some(input) = matches.get_one::<String>("input") {
        config.input_file = input.clone();
    }
    if let Some(margin) = matches.get_one::<String>("margin") {
        // Lenient like the configured default: a bad number keeps the configured value
        config.override_margin = margin.trim().parse().unwrap_or(config.override_margin);
    }

    let output_dir = config.output_directory.clone();
    fs::create_dir_all(&output_dir)?;
    clean_output_directory(&output_dir)?;

    println!("📂 Reading roster from: {}", config.input_file);
    println!("📄 Output directory: {} (cleaned)", output_dir);
    match config.capacity_mode {
        CapacityMode::Equal => println!("🪑 Capacity mode: equal split"),
        CapacityMode::Manual => println!(
            "🪑 Capacity mode: manual ({} departments configured)",
            config.manual_capacities.len()
        ),
    }
    println!("🎓 Staff-children margin: {}", config.override_margin);

    let roster = RosterReader::new().read_file(&config.input_file)?;
    println!("   ✅ Loaded {} students", roster.students.len());
    if roster.skipped_rows > 0 {
        println!(
            "   🔄 Skipped {} rows with unknown admission channel",
            roster.skipped_rows
        );
    }
    println!("   📑 Detected {} preference columns", roster.preference_slots);

    let allocator = DepartmentAllocator::from_config(&config);
    let outcome = allocator.run(&roster.students)?;

    generate_results_csv(&outcome, roster.preference_slots, &output_dir)?;
    generate_department_stats_csv(&outcome, &output_dir)?;
    generate_summary_report(&config, &outcome, &output_dir)?;

    print_summary(&outcome);

    println!("\n✅ Allocation complete!");
    println!("📂 Results: {}/allocation_results.csv", output_dir);
    println!("📂 Department stats: {}/department_stats.csv", output_dir);
    println!("📂 Summary: {}/allocation_summary.txt", output_dir);
    Ok(())
}

/// Annotated roster: every original field plus the assigned department
/// (or the unassigned sentinel) and the reason text.
fn generate_results_csv(
    outcome: &AllocationOutcome,
    preference_slots: usize,
    output_dir: &str,
) -> Result<()> {
    use csv::Writer;

    let csv_path = Path::new(output_dir).join("allocation_results.csv");
    let mut writer = Writer::from_path(csv_path)?;

    let mut headers: Vec<String> = ["id", "name", "score", "channel"]
        .iter()
        .map(|h| h.to_string())
        .collect();
    for rank in 1..=preference_slots {
        headers.push(format!("preference_{}", rank));
    }
    for tail in ["privileged", "note", "assigned_department", "reason"] {
        headers.push(tail.to_string());
    }
    writer.write_record(&headers)?;

    for student in outcome.all_students() {
        let record = &student.record;
        let mut row = vec![
            record.id.clone(),
            record.name.clone(),
            record.score.to_string(),
            record.channel.to_string(),
        ];
        for rank in 0..preference_slots {
            row.push(record.preferences.get(rank).cloned().unwrap_or_default());
        }
        row.push(if record.privileged { "yes" } else { "no" }.to_string());
        row.push(record.note.clone());
        row.push(student.department_label().to_string());
        row.push(student.reason.clone());
        writer.write_record(&row)?;
    }

    writer.flush()?;
    Ok(())
}

fn generate_department_stats_csv(outcome: &AllocationOutcome, output_dir: &str) -> Result<()> {
    use csv::Writer;

    let csv_path = Path::new(output_dir).join("department_stats.csv");
    let mut writer = Writer::from_path(csv_path)?;

    writer.write_record(["channel", "department", "accepted", "min_score"])?;
    for stat in &outcome.department_stats {
        writer.write_record(&[
            stat.channel.label().to_string(),
            stat.department.clone(),
            stat.accepted.to_string(),
            format!("{:.2}", stat.min_score),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

/// Text report with roster totals and each channel's primary minimum
/// scores, kept for auditing the override thresholds.
fn generate_summary_report(
    config: &Config,
    outcome: &AllocationOutcome,
    output_dir: &str,
) -> Result<()> {
    let mut content = String::new();
    content.push_str("Allocation Summary\n");
    content.push_str("==================\n\n");

    content.push_str(&format!("Students: {}\n", outcome.roster.total));
    for channel in Channel::ALL {
        content.push_str(&format!(
            "  {}: {}\n",
            channel,
            outcome.roster.channel_count(channel)
        ));
    }
    content.push('\n');

    let mode = match config.capacity_mode {
        CapacityMode::Equal => "equal",
        CapacityMode::Manual => "manual",
    };
    content.push_str(&format!("Capacity mode: {}\n", mode));
    content.push_str(&format!("Staff-children margin: {}\n", config.override_margin));
    content.push_str(&format!(
        "Departments ({}): {}\n\n",
        outcome.departments.len(),
        outcome.departments.join(", ")
    ));

    content.push_str("Primary minimum scores by channel:\n");
    for channel in &outcome.channels {
        content.push_str(&format!("[{}]\n", channel.channel));

        let mut minimums: Vec<(&String, &f64)> = channel.primary_minimums.iter().collect();
        minimums.sort_by(|a, b| a.0.cmp(b.0));

        if minimums.is_empty() {
            content.push_str("  (no primary acceptances)\n");
        }
        for (department, min_score) in minimums {
            content.push_str(&format!("  {}: {:.2}\n", department, min_score));
        }
    }

    fs::write(Path::new(output_dir).join("allocation_summary.txt"), content)?;
    Ok(())
}

fn print_summary(outcome: &AllocationOutcome) {
    println!("\n📊 SUMMARY");
    println!("==========\n");

    for channel in &outcome.channels {
        let accepted = channel.students.iter().filter(|s| s.is_assigned()).count();
        let unassigned = channel.students.len() - accepted;
        println!(
            "📈 {}: {} students, {} accepted, {} unassigned",
            channel.channel,
            channel.students.len(),
            accepted,
            unassigned
        );
    }

    println!("\n🏛️  Departments:");
    for stat in &outcome.department_stats {
        println!(
            "   {} [{}] - {} accepted (min score: {:.2})",
            stat.department, stat.channel, stat.accepted, stat.min_score
        );
    }
}

// Clean up previous results from the output directory
fn clean_output_directory(output_dir: &str) -> Result<()> {
    let output_path = Path::new(output_dir);

    if !output_path.exists() {
        return Ok(());
    }

    let items_to_clean = [
        "allocation_results.csv",
        "department_stats.csv",
        "allocation_summary.txt",
    ];

    for item in &items_to_clean {
        let item_path = output_path.join(item);
        if item_path.exists() {
            fs::remove_file(&item_path)?;
            println!("   🗑️  Removed previous {}", item);
        }
    }

    Ok(())
}
