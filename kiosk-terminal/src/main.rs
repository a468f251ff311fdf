//! 自助签到终端主程序

mod commands;
mod screen;

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use kiosk_admin::{init_logging, ConfigManager, KioskConfig};
use kiosk_core::{FilePreferenceStore, LanguageContext};
use kiosk_workflow::{
    CameraRequest, CheckInFlow, EngineSettings, EngineUpdate, FileSurface, KioskEngine,
    PatientCatalog, PrintSurface, QueueBoard, QueuePanel, QueueUpdate, RandomClassifier,
    ReceiptPrinter, ScanConfig, SimulatedCamera, StdoutSurface,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};
use tracing::{info, warn};

use crate::commands::{Command, HELP};

/// 签到终端命令行参数
#[derive(Parser, Debug)]
#[command(name = "kiosk-terminal")]
#[command(about = "Camasso 患者自助签到终端")]
struct Args {
    /// 配置文件路径
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 日志级别，覆盖配置
    #[arg(short, long)]
    log_level: Option<String>,

    /// 界面语言 (pt-BR, en-US, es)，会被保存为偏好
    #[arg(long)]
    language: Option<String>,

    /// 启动时显示叫号面板
    #[arg(short, long)]
    queue: bool,

    /// 写出默认配置文件后退出
    #[arg(long, value_name = "PATH")]
    init_config: Option<PathBuf>,
}

fn build_engine(config: &KioskConfig, language: Option<&str>) -> Result<KioskEngine> {
    let store = Arc::new(FilePreferenceStore::new(&config.kiosk.preference_path));
    let mut lang = LanguageContext::init(store, config.kiosk.resolved_host_locale().as_deref());
    if let Some(tag) = language {
        lang.set_language(tag.parse()?)
            .context("Failed to save language preference")?;
    }

    let surface: Arc<dyn PrintSurface> = match config.receipt.output.as_str() {
        "file" => Arc::new(FileSurface::new(&config.receipt.directory, config.receipt.width)),
        _ => Arc::new(StdoutSurface::new(config.receipt.width)),
    };

    let catalog = Arc::new(PatientCatalog::with_sample_data()?);
    info!("患者目录已加载，共 {} 条记录", catalog.len());
    let flow = CheckInFlow::new(catalog, ReceiptPrinter::new(surface));

    let settings = EngineSettings {
        scan: ScanConfig {
            tick_interval: config.scan.tick_interval(),
            progress_step: config.scan.progress_step,
            classify_after: config.scan.classify_after(),
            camera: CameraRequest::default(),
        },
        cpf_verify_delay: config.cpf.verify_delay(),
    };

    Ok(KioskEngine::new(
        flow,
        lang,
        Arc::new(SimulatedCamera::new()),
        Arc::new(RandomClassifier),
        settings,
    ))
}

fn start_queue(config: &KioskConfig, updates: UnboundedSender<QueueUpdate>) -> QueuePanel {
    info!("启动叫号面板...");
    QueuePanel::start(
        QueueBoard::demo(Utc::now(), config.queue.average_wait_minutes),
        config.queue.call_interval(),
        updates,
    )
}

fn show_updates(updates: Vec<EngineUpdate>, engine: &KioskEngine, kiosk_name: &str) {
    for update in updates {
        show_update(update, engine, kiosk_name);
    }
}

fn show_update(update: EngineUpdate, engine: &KioskEngine, kiosk_name: &str) {
    match update {
        EngineUpdate::StepChanged(_) => println!("{}", screen::render(engine, kiosk_name)),
        EngineUpdate::Notice(notice) => println!("{}", screen::render_notice(&notice)),
        EngineUpdate::ScanProgress(progress) => {
            let text = engine.lang().t_with(
                kiosk_core::TranslationKey::Scanning,
                &[("progress", &progress.to_string())],
            );
            print!("\r{}", text);
            if progress >= 100 {
                println!();
            }
            let _ = std::io::stdout().flush();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if let Some(path) = &args.init_config {
        ConfigManager::write_default(path)?;
        println!("default configuration written to {}", path.display());
        return Ok(());
    }

    let manager = ConfigManager::load(args.config.as_deref())?;
    let config = manager.config().clone();
    init_logging(&config.logging, args.log_level.as_deref())?;
    info!("启动 {}...", config.kiosk.name);

    let mut engine = build_engine(&config, args.language.as_deref())?;
    let name = config.kiosk.name.clone();

    let (queue_tx, mut queue_rx) = unbounded_channel();
    let mut panel = args.queue.then(|| start_queue(&config, queue_tx.clone()));

    println!("{}", screen::render(&engine, &name));
    println!("{}", HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read console input")? else {
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                let command = match line.parse::<Command>() {
                    Ok(command) => command,
                    Err(e) => {
                        println!("{}", e);
                        continue;
                    }
                };

                let updates = match command {
                    Command::Quit => break,
                    Command::Help => {
                        println!("{}", HELP);
                        Vec::new()
                    }
                    Command::Method(method) => {
                        if engine.step() == kiosk_workflow::KioskStep::Identification {
                            let mut updates = engine.switch_method(method);
                            updates.push(EngineUpdate::StepChanged(engine.step()));
                            updates
                        } else {
                            engine.select_method(method)
                        }
                    }
                    Command::Scan => engine.start_face_scan(),
                    Command::Type(raw) => {
                        if let Some(value) = engine.type_cpf(&raw) {
                            println!("CPF: {}", value);
                        }
                        Vec::new()
                    }
                    Command::Submit(raw) => {
                        let raw = raw.or_else(|| engine.cpf_value().map(str::to_string));
                        engine.submit_cpf(raw.as_deref().unwrap_or_default())
                    }
                    Command::Cancel => engine.cancel_identification(),
                    Command::Back => engine.back(),
                    Command::Confirm => engine.confirm(),
                    Command::NotMe => engine.reject(),
                    Command::NewSession => engine.new_session(),
                    Command::Language(language) => {
                        if let Err(e) = engine.set_language(language) {
                            warn!("语言偏好未保存: {}", e);
                        }
                        vec![EngineUpdate::StepChanged(engine.step())]
                    }
                    Command::Queue => {
                        match panel.as_ref().map(QueuePanel::snapshot) {
                            Some(board) => println!(
                                "{}",
                                screen::render_queue(&board, engine.lang(), Utc::now())
                            ),
                            None => panel = Some(start_queue(&config, queue_tx.clone())),
                        }
                        Vec::new()
                    }
                };
                show_updates(updates, &engine, &name);
            }
            Some(update) = engine.next_event() => {
                show_update(update, &engine, &name);
            }
            Some(QueueUpdate::Called { .. }) = queue_rx.recv() => {
                if let Some(panel) = &panel {
                    println!(
                        "{}",
                        screen::render_queue(&panel.snapshot(), engine.lang(), Utc::now())
                    );
                }
            }
        }
    }

    if let Some(mut panel) = panel.take() {
        panel.stop();
    }
    info!("签到终端已停止");
    Ok(())
}
