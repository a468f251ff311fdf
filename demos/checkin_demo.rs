//! 签到流程演示程序
//!
//! 依次演示人脸识别签到、CPF签到（含格式错误）以及叫号面板的候诊估算。

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use kiosk_core::{IdentificationMethod, Language, LanguageContext, MemoryPreferenceStore};
use kiosk_workflow::{
    busy_level_at, CameraRequest, CheckInFlow, EngineSettings, EngineUpdate, KioskEngine,
    KioskStep, PatientCatalog, QueueBoard, RandomClassifier, ReceiptPrinter, ScanConfig,
    SimulatedCamera, StdoutSurface,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_writer(std::io::stderr)
        .init();

    println!("🏥 Camasso 自助签到演示");
    println!("================================");

    let mut engine = demo_engine()?;

    demo_face_check_in(&mut engine).await?;
    demo_cpf_check_in(&mut engine).await?;
    demo_queue_panel();

    println!("\n✅ 演示完成！");
    Ok(())
}

fn demo_engine() -> anyhow::Result<KioskEngine> {
    let lang = LanguageContext::init(Arc::new(MemoryPreferenceStore::new(None)), Some("pt-BR"));
    let flow = CheckInFlow::new(
        Arc::new(PatientCatalog::with_sample_data()?),
        ReceiptPrinter::new(Arc::new(StdoutSurface::new(42))),
    );

    // 演示中加快扫描节奏
    let settings = EngineSettings {
        scan: ScanConfig {
            tick_interval: Duration::from_millis(20),
            progress_step: 5,
            classify_after: Duration::from_millis(200),
            camera: CameraRequest::default(),
        },
        cpf_verify_delay: Duration::from_millis(300),
    };

    Ok(KioskEngine::new(
        flow,
        lang,
        Arc::new(SimulatedCamera::new()),
        Arc::new(RandomClassifier),
        settings,
    ))
}

async fn wait_for_step(engine: &mut KioskEngine, target: KioskStep) -> anyhow::Result<()> {
    while engine.step() != target {
        match engine.next_event().await {
            Some(EngineUpdate::ScanProgress(progress)) if progress % 25 == 0 => {
                println!("   扫描进度: {}%", progress)
            }
            Some(EngineUpdate::Notice(notice)) => println!("   提示: {}", notice.message),
            Some(_) => {}
            None => anyhow::bail!("identification events closed"),
        }
    }
    Ok(())
}

fn print_updates(updates: &[EngineUpdate]) {
    for update in updates {
        match update {
            EngineUpdate::StepChanged(step) => println!("   步骤: {:?}", step),
            EngineUpdate::Notice(notice) => println!("   提示: {}", notice.message),
            EngineUpdate::ScanProgress(progress) => println!("   扫描进度: {}%", progress),
        }
    }
}

/// 演示人脸识别签到
async fn demo_face_check_in(engine: &mut KioskEngine) -> anyhow::Result<()> {
    println!("\n📷 人脸识别签到");
    println!("------------------");

    print_updates(&engine.select_method(IdentificationMethod::Face));
    print_updates(&engine.start_face_scan());
    wait_for_step(engine, KioskStep::Confirmation).await?;

    if let Some(patient) = engine.patient() {
        println!("   识别患者: {} ({})", patient.name, patient.initials());
    }

    print_updates(&engine.confirm());
    print_updates(&engine.new_session());
    Ok(())
}

/// 演示CPF签到
async fn demo_cpf_check_in(engine: &mut KioskEngine) -> anyhow::Result<()> {
    println!("\n🔢 CPF签到");
    println!("------------------");

    engine.set_language(Language::EnUs)?;
    print_updates(&engine.select_method(IdentificationMethod::Cpf));

    println!("   输入格式化: {:?}", engine.type_cpf("9876543"));
    print_updates(&engine.submit_cpf("9876543"));

    print_updates(&engine.submit_cpf("987.654.321-00"));
    wait_for_step(engine, KioskStep::Confirmation).await?;
    if let Some(patient) = engine.patient() {
        println!("   识别患者: {}", patient.name);
    }

    print_updates(&engine.reject());
    print_updates(&engine.back());
    Ok(())
}

/// 演示叫号面板
fn demo_queue_panel() {
    println!("\n📋 叫号面板");
    println!("------------------");

    let now = Utc::now();
    let mut board = QueueBoard::demo(now, 12.0);
    let busy = busy_level_at(&chrono::Local::now());
    board.reestimate(busy);
    println!("   繁忙程度: {:?}", busy);

    for item in board.waiting() {
        println!(
            "   {} {} -> {} (约 {:?} 分钟)",
            item.number, item.name, item.destination, item.estimated_wait_minutes
        );
    }

    if let Some(called) = board.call_next(Utc::now()) {
        board.reestimate(busy);
        println!("   叫号: {} {}", called.number, called.name);
    }
    let stats = board.stats();
    println!(
        "   等候 {} / 已叫号 {} / 就诊中 {}",
        stats.waiting, stats.called, stats.attending
    );
}
