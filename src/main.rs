use intakeflow_rust::config::AppConfig;
use intakeflow_rust::demo::{demo_gateway, run_demo};
use std::process::exit;

#[tokio::main]
async fn main() {
    env_logger::init();
    let config = match AppConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("[intakeflow] {e}");
            exit(3);
        }
    };

    let report = match run_demo(&config, demo_gateway()).await {
        Ok(r) => r,
        Err(e) => {
            eprintln!("[intakeflow] {} ({e})", e.user_message());
            exit(5);
        }
    };

    println!("== Alumno {} ({}, grado {})", report.student.id, report.student.name, report.student.grade);
    for g in &report.student.goals {
        println!("   - {} [baseline: {}]", g.text, g.baseline.as_deref().unwrap_or("-"));
    }
    println!("== Eventos de la sesión");
    for ev in &report.events {
        println!("   #{} {:?}", ev.seq, ev.kind);
    }
    println!("== Diario ({:?})", report.like);
    for e in &report.entries {
        let heart = if e.liked == Some(true) { "♥" } else { "♡" };
        println!("   {} {} {:>3}  {}", e.id, heart, e.like_count, e.title);
    }
}
