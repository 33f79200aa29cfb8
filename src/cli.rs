//! Command-line surface of `spacemake-config`.
//!
//! Every command returns the text to print on stdout. Mutating commands
//! hold [`ConfigLock`] across load, mutation and dump, and dump only after
//! the mutation and the integrity check succeeded.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use spacemake_barcode::{max_barcode_mismatch, BarcodeStructure};

use crate::config::{ConfigLock, ConfigStore};
use crate::error::{ConfigError, ConfigResult};
use crate::registry::VariableKey;
use crate::schema::{Category, FieldMap, FieldValue, DEFAULT_REFERENCE};

#[derive(Debug, Parser)]
#[command(name = "spacemake-config")]
#[command(about = "Manage species, pucks, barcode flavors and run modes of a spacemake project", version)]
pub struct Cli {
    /// Configuration document to operate on
    #[arg(long, global = true, env = "SPACEMAKE_CONFIG", default_value = "config.yaml")]
    pub config: PathBuf,

    /// Seconds to wait for another process holding the configuration lock
    #[arg(long, global = true, default_value_t = 10)]
    pub lock_timeout_secs: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
#[command(rename_all = "snake_case")]
pub enum Command {
    /// List all pucks
    ListPucks(ListArgs),
    /// Add a new puck
    AddPuck(PuckArgs),
    /// Update an existing puck
    UpdatePuck(PuckArgs),
    /// Delete a puck
    DeletePuck(NameArgs),

    /// List all barcode flavors
    ListBarcodeFlavors(ListArgs),
    /// Add a new barcode flavor
    AddBarcodeFlavor(BarcodeFlavorArgs),
    /// Update an existing barcode flavor
    UpdateBarcodeFlavor(BarcodeFlavorArgs),
    /// Delete a barcode flavor
    DeleteBarcodeFlavor(NameArgs),

    /// List all run modes as stored
    ListRunModes(ListArgs),
    /// Add a new run mode
    AddRunMode(RunModeArgs),
    /// Update an existing run mode
    UpdateRunMode(RunModeArgs),
    /// Delete a run mode
    DeleteRunMode(NameArgs),
    /// Show a run mode with its parents and defaults applied
    ShowRunMode(NameArgs),

    /// List all species and their references
    ListSpecies(ListArgs),
    /// Add a reference to a species
    AddSpecies(SpeciesArgs),
    /// Update a reference of a species
    UpdateSpecies(SpeciesArgs),
    /// Delete a reference of a species
    DeleteSpecies(SpeciesKeyArgs),

    /// Print the demultiplexing mismatch budget for a set of sample indices
    DemuxMismatch {
        #[arg(required = true)]
        indices: Vec<String>,
    },

    /// Print the extraction rules of a barcode structure expression
    ParseBarcode { expression: String },
}

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Print JSON instead of YAML
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct NameArgs {
    #[arg(long)]
    pub name: String,
}

#[derive(Debug, Args)]
#[command(rename_all = "snake_case")]
pub struct PuckArgs {
    #[arg(long)]
    pub name: String,
    /// Width of the puck in micrometers
    #[arg(long)]
    pub width_um: Option<f64>,
    /// Spot diameter in micrometers
    #[arg(long)]
    pub spot_diameter_um: Option<f64>,
    /// Barcode position file
    #[arg(long)]
    pub barcodes: Option<String>,
    /// Coordinate system file for multi-tile pucks
    #[arg(long)]
    pub coordinate_system: Option<String>,
}

#[derive(Debug, Args)]
#[command(rename_all = "snake_case")]
pub struct BarcodeFlavorArgs {
    #[arg(long)]
    pub name: String,
    /// Structure of the UMI, e.g. 'r1[12:20]'
    #[arg(long)]
    pub umi: Option<String>,
    /// Structure of the cell barcode, e.g. 'r1[0:12]'
    #[arg(long)]
    pub cell_barcode: Option<String>,
}

#[derive(Debug, Args)]
#[command(rename_all = "snake_case")]
pub struct RunModeArgs {
    #[arg(long)]
    pub name: String,
    #[arg(long)]
    pub parent_run_mode: Option<String>,
    #[arg(long)]
    pub n_beads: Option<i64>,
    /// One or more UMI cutoffs
    #[arg(long, num_args = 1..)]
    pub umi_cutoff: Option<Vec<i64>>,
    #[arg(long)]
    pub clean_dge: Option<String>,
    #[arg(long)]
    pub detect_tissue: Option<String>,
    #[arg(long = "polyA_adapter_trimming")]
    pub polya_adapter_trimming: Option<String>,
    #[arg(long)]
    pub count_mm_reads: Option<String>,
    #[arg(long)]
    pub count_intronic_reads: Option<String>,
    #[arg(long)]
    pub mesh_data: Option<String>,
    /// circle or hexagon
    #[arg(long)]
    pub mesh_type: Option<String>,
    #[arg(long)]
    pub mesh_spot_diameter_um: Option<f64>,
    #[arg(long)]
    pub mesh_spot_distance_um: Option<f64>,
    #[arg(long)]
    pub spatial_barcode_min_matches: Option<f64>,
}

#[derive(Debug, Args)]
#[command(rename_all = "snake_case")]
pub struct SpeciesArgs {
    #[arg(long)]
    pub name: String,
    /// Reference name, e.g. genome or rRNA
    #[arg(long)]
    pub reference: Option<String>,
    /// FASTA sequence (.fa or .fa.gz)
    #[arg(long)]
    pub sequence: Option<String>,
    /// GTF annotation (.gtf or .gtf.gz)
    #[arg(long)]
    pub annotation: Option<String>,
    /// Deprecated: same as --sequence <PATH> --reference genome
    #[arg(long, conflicts_with_all = ["sequence", "reference"])]
    pub genome: Option<String>,
    #[arg(long = "STAR_index_dir")]
    pub star_index_dir: Option<String>,
    #[arg(long = "BT2_index")]
    pub bt2_index: Option<String>,
    #[arg(long = "BT2_flags")]
    pub bt2_flags: Option<String>,
    #[arg(long = "STAR_flags")]
    pub star_flags: Option<String>,
}

#[derive(Debug, Args)]
pub struct SpeciesKeyArgs {
    #[arg(long)]
    pub name: String,
    #[arg(long)]
    pub reference: String,
}

/// Collects the flags a user actually passed.
#[derive(Default)]
struct FieldsBuilder(FieldMap);

impl FieldsBuilder {
    fn set(mut self, field: &str, value: Option<impl Into<FieldValue>>) -> Self {
        if let Some(value) = value {
            self.0.insert(field.to_string(), value.into());
        }
        self
    }

    fn build(self) -> FieldMap {
        self.0
    }
}

impl PuckArgs {
    fn key(&self) -> VariableKey {
        VariableKey::new(&self.name)
    }

    fn fields(&self) -> FieldMap {
        FieldsBuilder::default()
            .set("width_um", self.width_um)
            .set("spot_diameter_um", self.spot_diameter_um)
            .set("barcodes", self.barcodes.clone())
            .set("coordinate_system", self.coordinate_system.clone())
            .build()
    }
}

impl BarcodeFlavorArgs {
    fn key(&self) -> VariableKey {
        VariableKey::new(&self.name)
    }

    fn fields(&self) -> FieldMap {
        FieldsBuilder::default()
            .set("cell", self.cell_barcode.clone())
            .set("UMI", self.umi.clone())
            .build()
    }
}

impl RunModeArgs {
    fn key(&self) -> VariableKey {
        VariableKey::new(&self.name)
    }

    fn fields(&self) -> FieldMap {
        FieldsBuilder::default()
            .set("parent_run_mode", self.parent_run_mode.clone())
            .set("n_beads", self.n_beads)
            .set("umi_cutoff", self.umi_cutoff.clone())
            .set("clean_dge", self.clean_dge.clone())
            .set("detect_tissue", self.detect_tissue.clone())
            .set("polyA_adapter_trimming", self.polya_adapter_trimming.clone())
            .set("count_mm_reads", self.count_mm_reads.clone())
            .set("count_intronic_reads", self.count_intronic_reads.clone())
            .set("mesh_data", self.mesh_data.clone())
            .set("mesh_type", self.mesh_type.clone())
            .set("mesh_spot_diameter_um", self.mesh_spot_diameter_um)
            .set("mesh_spot_distance_um", self.mesh_spot_distance_um)
            .set("spatial_barcode_min_matches", self.spatial_barcode_min_matches)
            .build()
    }
}

impl SpeciesArgs {
    fn key(&self) -> VariableKey {
        let reference = match (&self.genome, &self.reference) {
            (Some(_), _) => DEFAULT_REFERENCE.to_string(),
            (None, Some(reference)) => reference.clone(),
            (None, None) => DEFAULT_REFERENCE.to_string(),
        };
        VariableKey::species(&self.name, reference)
    }

    fn fields(&self) -> FieldMap {
        FieldsBuilder::default()
            .set("sequence", self.sequence.clone().or_else(|| self.genome.clone()))
            .set("annotation", self.annotation.clone())
            .set("STAR_index_dir", self.star_index_dir.clone())
            .set("BT2_index", self.bt2_index.clone())
            .set("BT2_flags", self.bt2_flags.clone())
            .set("STAR_flags", self.star_flags.clone())
            .build()
    }
}

enum Mutation {
    Add(FieldMap),
    Update(FieldMap),
    Delete,
}

/// Run a parsed command line and return what it prints.
pub fn run(cli: Cli) -> ConfigResult<String> {
    let timeout = Duration::from_secs(cli.lock_timeout_secs);
    let config = cli.config;

    let mutate = |category: Category, key: VariableKey, mutation: Mutation| -> ConfigResult<String> {
        let _lock = ConfigLock::acquire(&config, timeout)?;
        let mut store = ConfigStore::load(&config)?;
        let result = match mutation {
            Mutation::Add(fields) => store.add(category, &key, fields)?,
            Mutation::Update(fields) => store.update(category, &key, fields)?,
            Mutation::Delete => store.delete(category, &key)?,
        };
        store.dump()?;
        to_yaml(&result)
    };
    let list = |category: Category, args: ListArgs| -> ConfigResult<String> {
        let store = ConfigStore::load(&config)?;
        let table = store.registry(category).table();
        if args.json {
            serde_json::to_string_pretty(&table)
                .map_err(|e| ConfigError::MalformedDocument(e.to_string()))
        } else {
            to_yaml(&table)
        }
    };

    match cli.command {
        Command::ListPucks(args) => list(Category::Puck, args),
        Command::AddPuck(args) => mutate(Category::Puck, args.key(), Mutation::Add(args.fields())),
        Command::UpdatePuck(args) => mutate(Category::Puck, args.key(), Mutation::Update(args.fields())),
        Command::DeletePuck(args) => mutate(Category::Puck, VariableKey::new(args.name), Mutation::Delete),

        Command::ListBarcodeFlavors(args) => list(Category::BarcodeFlavor, args),
        Command::AddBarcodeFlavor(args) => {
            mutate(Category::BarcodeFlavor, args.key(), Mutation::Add(args.fields()))
        }
        Command::UpdateBarcodeFlavor(args) => {
            mutate(Category::BarcodeFlavor, args.key(), Mutation::Update(args.fields()))
        }
        Command::DeleteBarcodeFlavor(args) => {
            mutate(Category::BarcodeFlavor, VariableKey::new(args.name), Mutation::Delete)
        }

        Command::ListRunModes(args) => list(Category::RunMode, args),
        Command::AddRunMode(args) => mutate(Category::RunMode, args.key(), Mutation::Add(args.fields())),
        Command::UpdateRunMode(args) => {
            mutate(Category::RunMode, args.key(), Mutation::Update(args.fields()))
        }
        Command::DeleteRunMode(args) => {
            mutate(Category::RunMode, VariableKey::new(args.name), Mutation::Delete)
        }
        Command::ShowRunMode(args) => {
            let store = ConfigStore::load(&config)?;
            to_yaml(&store.run_mode(&args.name)?)
        }

        Command::ListSpecies(args) => list(Category::Species, args),
        Command::AddSpecies(args) => mutate(Category::Species, args.key(), Mutation::Add(args.fields())),
        Command::UpdateSpecies(args) => {
            mutate(Category::Species, args.key(), Mutation::Update(args.fields()))
        }
        Command::DeleteSpecies(args) => mutate(
            Category::Species,
            VariableKey::species(args.name, args.reference),
            Mutation::Delete,
        ),

        Command::DemuxMismatch { indices } => Ok(max_barcode_mismatch(&indices)?.to_string()),
        Command::ParseBarcode { expression } => {
            let structure = BarcodeStructure::parse(&expression).map_err(|source| {
                ConfigError::InvalidBarcodeStructure {
                    field: "expression".to_string(),
                    source,
                }
            })?;
            to_yaml(&structure)
        }
    }
}

fn to_yaml<T: Serialize + ?Sized>(value: &T) -> ConfigResult<String> {
    Ok(serde_yaml::to_string(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_snake_case_command_names() {
        let cli = parse(&["spacemake-config", "add_puck", "--name", "p1", "--width_um", "3000"]);
        match cli.command {
            Command::AddPuck(args) => {
                assert_eq!(args.name, "p1");
                assert_eq!(args.width_um, Some(3000.0));
            }
            other => panic!("unexpected command: {other:?}"),
        }
        assert_eq!(cli.config, PathBuf::from("config.yaml"));
        assert_eq!(cli.lock_timeout_secs, 10);
    }

    #[test]
    fn test_barcode_flavor_flags_map_to_fields() {
        let cli = parse(&[
            "spacemake-config",
            "add_barcode_flavor",
            "--name",
            "f",
            "--umi",
            "r1[12:20]",
            "--cell_barcode",
            "r1[0:12]",
        ]);
        let Command::AddBarcodeFlavor(args) = cli.command else {
            panic!("expected add_barcode_flavor");
        };
        let fields = args.fields();
        assert_eq!(fields["UMI"], FieldValue::Str("r1[12:20]".into()));
        assert_eq!(fields["cell"], FieldValue::Str("r1[0:12]".into()));
    }

    #[test]
    fn test_run_mode_flags() {
        let cli = parse(&[
            "spacemake-config",
            "update_run_mode",
            "--name",
            "rm",
            "--umi_cutoff",
            "10",
            "20",
            "--polyA_adapter_trimming",
            "yes",
        ]);
        let Command::UpdateRunMode(args) = cli.command else {
            panic!("expected update_run_mode");
        };
        let fields = args.fields();
        assert_eq!(fields["umi_cutoff"], FieldValue::IntList(vec![10, 20]));
        assert_eq!(fields["polyA_adapter_trimming"], FieldValue::Str("yes".into()));
        assert_eq!(fields.len(), 2);
    }

    #[test]
    fn test_deprecated_genome_flag() {
        let cli = parse(&["spacemake-config", "add_species", "--name", "human", "--genome", "hg38.fa"]);
        let Command::AddSpecies(args) = cli.command else {
            panic!("expected add_species");
        };
        assert_eq!(args.key(), VariableKey::species("human", "genome"));
        assert_eq!(args.fields()["sequence"], FieldValue::Str("hg38.fa".into()));

        let conflict = Cli::try_parse_from([
            "spacemake-config",
            "add_species",
            "--name",
            "human",
            "--genome",
            "a.fa",
            "--sequence",
            "b.fa",
        ]);
        assert!(conflict.is_err());
    }

    #[test]
    fn test_delete_species_requires_reference() {
        let missing = Cli::try_parse_from(["spacemake-config", "delete_species", "--name", "human"]);
        assert!(missing.is_err());
    }

    #[test]
    fn test_demux_mismatch_command() {
        let cli = parse(&["spacemake-config", "demux_mismatch", "ACGTACGT", "ACGTTGCA"]);
        assert_eq!(run(cli).unwrap(), "1");
    }
}
