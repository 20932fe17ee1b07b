use clap::{Parser, Subcommand, ValueEnum};
use rxpad_core::{artifact_filename, CoreConfig, CoreServices, Database, NewPatient, RenderOptions};
use rxpad_ident::{new_identifier, IdPrefix};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "rxpad")]
#[command(about = "RxPad prescription system CLI")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, ValueEnum)]
enum IdKind {
    Patient,
    Prescription,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or migrate the database and print its schema version
    InitDb,
    /// Print a fresh external identifier
    NewId {
        #[arg(value_enum)]
        kind: IdKind,
    },
    /// List patients, newest first
    ListPatients {
        /// Substring of name, patient id or phone
        #[arg(long)]
        search: Option<String>,
        /// Only starred patients
        #[arg(long)]
        starred: bool,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Create a patient
    CreatePatient {
        name: String,
        #[arg(long, default_value_t = 0)]
        age: i64,
        #[arg(long, default_value = "")]
        gender: String,
        #[arg(long, default_value = "")]
        phone: String,
        #[arg(long, default_value = "")]
        email: String,
    },
    /// Compare archived artifacts in blob storage with prescription records
    Reconcile,
    /// Print a signed download URL for a prescription's archived PDF
    DownloadUrl {
        /// Prescription identifier (RX...)
        prescription_id: String,
    },
    /// Render an HTML file to PDF, optionally archiving it against a prescription
    Render {
        /// HTML input file
        input: PathBuf,
        /// PDF output file
        output: PathBuf,
        /// Prescription to archive the PDF against
        #[arg(long)]
        archive: Option<String>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("rxpad_core=warn".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("Use 'rxpad --help' for commands");
        return Ok(());
    };

    if let Commands::NewId { kind } = command {
        let prefix = match kind {
            IdKind::Patient => IdPrefix::Patient,
            IdKind::Prescription => IdPrefix::Prescription,
        };
        println!("{}", new_identifier(prefix));
        return Ok(());
    }

    let cfg = CoreConfig::from_lookup(|name| std::env::var(name).ok())?;

    if let Commands::InitDb = command {
        let db = Database::open(cfg.database_path())?;
        println!(
            "Database {} at schema version {}",
            cfg.database_path().display(),
            db.schema_version()?
        );
        return Ok(());
    }

    let services = CoreServices::open(&cfg)?;

    match command {
        Commands::ListPatients {
            search,
            starred,
            page,
        } => {
            let result = services.patients.search(search.as_deref(), starred, page)?;
            if result.items.is_empty() {
                println!("No patients found.");
            } else {
                for p in &result.items {
                    println!(
                        "ID: {}, Name: {}, Phone: {}, Created: {}",
                        p.patient_id, p.name, p.phone, p.created_at
                    );
                }
                println!("Page {} of {} ({} total)", result.page, result.pages(), result.total);
            }
        }
        Commands::CreatePatient {
            name,
            age,
            gender,
            phone,
            email,
        } => {
            let patient = services.patients.create(NewPatient {
                name,
                age,
                gender,
                phone,
                email,
                ..NewPatient::default()
            })?;
            println!("Created patient with ID: {}", patient.patient_id);
        }
        Commands::Reconcile => {
            let report = services.reconciler.sweep()?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.is_clean() {
                std::process::exit(1);
            }
        }
        Commands::DownloadUrl { prescription_id } => {
            let rx = services.prescriptions.get(&prescription_id)?;
            let url = rx.pdf_cloud_path.as_deref().and_then(|path| {
                services
                    .retrieval
                    .get_download_url(path, services.download_url_ttl())
            });
            match url {
                Some(url) => println!("{}", url),
                None => {
                    eprintln!("No archived PDF available for {}", prescription_id);
                    std::process::exit(1);
                }
            }
        }
        Commands::Render {
            input,
            output,
            archive,
        } => {
            let html = std::fs::read_to_string(&input)?;
            let pdf = services.renderer.render(&html, &RenderOptions::default())?;
            std::fs::write(&output, &pdf)?;
            println!("Wrote {} ({} bytes)", output.display(), pdf.len());

            if let Some(prescription_id) = archive {
                let rx = services.prescriptions.get(&prescription_id)?;
                let archived = services.archiver.archive(
                    &pdf,
                    &artifact_filename(&rx.prescription_id),
                    rx.prescription_id.as_str(),
                )?;
                println!("Archived at {}", archived.path);
            }
        }
        Commands::NewId { .. } | Commands::InitDb => {}
    }

    Ok(())
}
