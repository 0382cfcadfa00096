use anyhow::{bail, Context, Result};
use colored::*;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::io::{self, Write};
use std::path::Path;
use std::time::Instant;

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    success: bool,
    data: Option<SubmitData>,
    code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SubmitData {
    id: serde_json::Value,
}

struct Settings {
    base_url: String,
    file_path: String,
    submissions: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    println!("{}", "🚌 Route Ingest Testing Tool".bright_blue().bold());
    println!("{}", "=====================================".bright_blue());
    println!();

    let settings = get_settings()?;
    let file_name = Path::new(&settings.file_path)
        .file_name()
        .and_then(|n| n.to_str())
        .context("la ruta del archivo no tiene nombre")?
        .to_string();
    let bytes = std::fs::read(&settings.file_path)
        .with_context(|| format!("no se pudo leer {}", settings.file_path))?;

    println!();
    println!(
        "{}",
        format!(
            "🚀 Enviando {} rutas en paralelo a {}/enviar",
            settings.submissions, settings.base_url
        )
        .bright_cyan()
        .bold()
    );

    let client = reqwest::Client::new();
    let started = Instant::now();

    let handles: Vec<_> = (0..settings.submissions)
        .map(|n| {
            let client = client.clone();
            let url = format!("{}/enviar", settings.base_url);
            let file_name = file_name.clone();
            let bytes = bytes.clone();
            tokio::spawn(async move { submit(&client, &url, n, file_name, bytes).await })
        })
        .collect();

    let mut ids = Vec::new();
    let mut failures = 0usize;
    for handle in handles {
        match handle.await? {
            Ok(id) => {
                println!("{} {}", "✅ id".bright_green(), id);
                ids.push(id);
            }
            Err(e) => {
                failures += 1;
                println!("{} {}", "❌".bright_red(), e);
            }
        }
    }

    println!();
    println!(
        "{}",
        format!(
            "⏱️  {} envíos en {:?} ({} fallidos)",
            settings.submissions,
            started.elapsed(),
            failures
        )
        .bright_blue()
    );

    report(&ids)
}

fn prompt(label: &str, default: &str) -> Result<String> {
    print!("{}", format!("{} [{}]: ", label, default).bright_yellow());
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    let line = line.trim();
    Ok(if line.is_empty() { default.to_string() } else { line.to_string() })
}

fn get_settings() -> Result<Settings> {
    println!("{}", "⚙️  CONFIGURACIÓN".bright_cyan().bold());
    println!("{}", "=================".bright_cyan());

    let base_url = prompt("URL del servidor", "http://localhost:3000")?;
    let file_path = prompt("Archivo de ruta (.geojson o .kml)", "rota.geojson")?;
    let submissions = prompt("Envíos concurrentes", "10")?
        .parse::<usize>()
        .context("el número de envíos debe ser un entero")?;

    Ok(Settings {
        base_url: base_url.trim_end_matches('/').to_string(),
        file_path,
        submissions,
    })
}

async fn submit(
    client: &reqwest::Client,
    url: &str,
    n: usize,
    file_name: String,
    bytes: Vec<u8>,
) -> Result<serde_json::Value> {
    let form = reqwest::multipart::Form::new()
        .text("companhia", "Testing Tool")
        .text("cor", "#00AA55")
        .text("rota", format!("Carga {}", n))
        .text("nrota", n.to_string())
        .part(
            "geojson",
            reqwest::multipart::Part::bytes(bytes).file_name(file_name),
        );

    let response = client.post(url).multipart(form).send().await?;
    let status = response.status();
    let body: SubmitResponse = response.json().await?;

    match body.data {
        Some(data) if body.success => Ok(data.id),
        _ => bail!(
            "HTTP {} ({})",
            status,
            body.code.unwrap_or_else(|| "sin código".to_string())
        ),
    }
}

/// Comprueba que los ids son únicos y, si son enteros, contiguos
fn report(ids: &[serde_json::Value]) -> Result<()> {
    let unique: BTreeSet<String> = ids.iter().map(|id| id.to_string()).collect();
    if unique.len() != ids.len() {
        println!("{}", "❌ Hay ids duplicados".bright_red().bold());
        bail!("{} ids duplicados", ids.len() - unique.len());
    }

    let numeric: Option<BTreeSet<u64>> = ids.iter().map(|id| id.as_u64()).collect();
    match numeric {
        Some(numbers) if !numbers.is_empty() => {
            let (first, last) = match (numbers.iter().next(), numbers.iter().next_back()) {
                (Some(first), Some(last)) => (*first, *last),
                _ => return Ok(()),
            };
            let contiguous = last - first + 1 == numbers.len() as u64;
            if contiguous {
                println!(
                    "{}",
                    format!("✅ {} ids únicos y contiguos ({}..={})", numbers.len(), first, last)
                        .bright_green()
                        .bold()
                );
            } else {
                println!(
                    "{}",
                    format!("⚠️  ids únicos pero con huecos ({}..={})", first, last).bright_yellow()
                );
            }
        }
        _ => {
            println!(
                "{}",
                format!("✅ {} ids opacos únicos", unique.len()).bright_green().bold()
            );
        }
    }
    Ok(())
}
