use baleen::app::steps::build_steps;
use baleen::config::bootstrap::{Bootstrap, LIB_PATH_VAR};
use baleen::utils::logger;
use baleen::{BaleenError, CliConfig, Command, GlobalSettings, LogFormat, StepRunner};
use clap::Parser;

#[tokio::main]
async fn main() {
    let cli = CliConfig::parse();

    // env 只輸出 shell 指令，不需要日誌與設定檔
    if let Command::Env { dir } = &cli.command {
        match Bootstrap::resolve(dir.as_deref())
            .and_then(|b| b.exports(std::env::var_os(LIB_PATH_VAR)))
        {
            Ok(exports) => print!("{}", exports),
            Err(e) => fail(&e),
        }
        return;
    }

    if let Err(e) = run(cli).await {
        tracing::error!(
            "❌ baleen failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
        fail(&e);
    }
}

async fn run(cli: CliConfig) -> baleen::Result<()> {
    let config = cli.load_ini()?;
    let section = config.section(&cli.section)?;

    // 初始化日誌
    let global = GlobalSettings::from_section(&section)?;
    match global.log_format {
        LogFormat::Compact => logger::init_cli_logger(cli.verbose, global.log_level.as_deref()),
        LogFormat::Json => logger::init_json_logger(cli.verbose, global.log_level.as_deref()),
    }

    tracing::info!("Starting baleen {}", cli.command.step_name());
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }
    if cli.monitor {
        tracing::info!("🔍 System monitoring enabled");
    }

    let mut runner = StepRunner::new().with_monitoring(cli.monitor);
    for step in build_steps(cli.command, &section)? {
        runner.add_step(step);
    }

    let reports = runner.run_all().await?;
    let summary = StepRunner::get_execution_summary(&reports);
    tracing::info!("📊 Execution summary: {}", serde_json::to_string(&summary)?);

    for report in &reports {
        for output in &report.outputs {
            tracing::debug!("📁 {}: {}", report.step_name, output.display());
        }
    }
    println!("✅ {} completed", runner.run_id());

    Ok(())
}

fn fail(e: &BaleenError) -> ! {
    // 輸出用戶友好的錯誤信息
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 建議: {}", e.recovery_suggestion());
    std::process::exit(e.exit_code().max(1));
}
