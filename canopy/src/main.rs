use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use canopy::config::Config;
use canopy::index::{NodeStore, SplitParams, TreeBuilder};
use canopy::oracle::llm::LlmOracle;
use canopy::retrieval::Retriever;

#[derive(Parser)]
#[command(name = "canopy")]
#[command(about = "Hierarchical document index with LLM-guided retrieval")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build a persisted index over one or more document files
    Index {
        /// Input document files, in order
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Maximum chunk size, in characters
        #[arg(long, default_value_t = 4000)]
        chunk_length: usize,

        /// Characters shared between consecutive chunks
        #[arg(long, default_value_t = 20)]
        chunk_overlap: usize,

        /// Maximum children per tree level
        #[arg(long, default_value_t = 10)]
        max_subtopics: usize,

        /// Name of the root node within the index directory
        #[arg(long, default_value = "root")]
        name: String,

        /// Provenance label recorded on every node (defaults to the file list)
        #[arg(long)]
        source: Option<String>,
    },
    /// Query a persisted index for the most relevant leaf texts
    Query {
        /// The question to find sources for
        question: String,

        /// Name of the root node within the index directory
        #[arg(long, default_value = "root")]
        name: String,

        /// Bound on candidate nodes held in memory during traversal
        #[arg(long, default_value_t = 10)]
        max_memory_nodes: usize,

        /// Children scoring at or below this are not expanded
        #[arg(long, default_value_t = 0.1)]
        relevance_threshold: f64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "canopy=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    let oracle_config = config.oracle.as_ref().ok_or_else(|| {
        anyhow::anyhow!("CANOPY_LLM_MODEL is not set - an oracle model is required")
    })?;

    let store = NodeStore::new(&config.index.directory);

    match args.command {
        Command::Index {
            files,
            chunk_length,
            chunk_overlap,
            max_subtopics,
            name,
            source,
        } => {
            let oracle =
                LlmOracle::new(oracle_config)?.with_summary_budget(chunk_length, max_subtopics);

            let mut documents = Vec::with_capacity(files.len());
            for file in &files {
                documents.push(tokio::fs::read_to_string(file).await?);
            }

            let source = source.unwrap_or_else(|| {
                files
                    .iter()
                    .map(|f| f.to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join(",")
            });

            let builder = TreeBuilder::new(
                SplitParams {
                    chunk_length,
                    chunk_overlap,
                    max_subtopics,
                },
                source,
            )?;

            tracing::info!(documents = documents.len(), "building topic tree...");
            let mut tree = builder.build(documents)?;

            tracing::info!("summarizing tree (this calls the oracle per node)...");
            tree.describe(&oracle).await?;

            tracing::info!(directory = %config.index.directory, "writing index...");
            let root_reference = store.write_tree(&tree, &name, &oracle).await?;

            println!("{root_reference}");
        }
        Command::Query {
            question,
            name,
            max_memory_nodes,
            relevance_threshold,
        } => {
            let oracle = LlmOracle::new(oracle_config)?;
            let root_reference = store.reference_for(&name);

            let retriever = Retriever::new(
                store,
                Arc::new(oracle),
                max_memory_nodes,
                relevance_threshold,
            )?;
            let retriever = match &oracle_config.persona {
                Some(persona) => retriever.with_persona(persona.as_str()),
                None => retriever,
            };

            let texts = retriever.retrieve(&question, &root_reference).await?;
            tracing::info!(results = texts.len(), "retrieval finished");

            for (i, text) in texts.iter().enumerate() {
                if i > 0 {
                    println!("\n---\n");
                }
                println!("{text}");
            }
        }
    }

    Ok(())
}
