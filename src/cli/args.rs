// args.rs - Command line arguments definition

use argh::FromArgs;

#[derive(FromArgs)]
/// mlstcall - allele calling, schema update and profile tabulation for MLST schemes
pub struct Args {
    /// path to TOML configuration file
    #[argh(option)]
    pub config: Option<String>,

    /// number of threads (default: auto-detect)
    #[argh(option)]
    pub threads: Option<usize>,

    /// enable debug logging
    #[argh(switch, short = 'v')]
    pub verbose: bool,

    /// generate sample configuration file and exit
    #[argh(switch)]
    pub generate_config: bool,

    #[argh(subcommand)]
    pub command: Option<Command>,
}

#[derive(FromArgs)]
#[argh(subcommand)]
pub enum Command {
    Call(CallArgs),
    Update(UpdateArgs),
    Tabulate(TabulateArgs),
}

#[derive(FromArgs)]
/// call alleles for one genome FASTA or a directory of genomes
#[argh(subcommand, name = "call")]
pub struct CallArgs {
    /// genome FASTA file or directory of genome FASTA files
    #[argh(option, short = 'i')]
    pub input: String,

    /// directory of allele FASTA files, one per locus
    #[argh(option, short = 'a')]
    pub alleles: String,

    /// output JSON file, directory, or - for stdout (default: stdout)
    #[argh(option, short = 'o')]
    pub output: Option<String>,

    /// minimum identity for a hit to qualify (0.0-1.0, default: 0.90)
    #[argh(option)]
    pub identity_floor: Option<f64>,

    /// minimum fraction of the allele a hit must cover (0.0-1.0, default: 0.50)
    #[argh(option)]
    pub min_coverage: Option<f64>,

    /// search adapter: parasail, exact (default: parasail)
    #[argh(option)]
    pub search: Option<String>,

    /// alignment mode: dna, dna-strict, dna-permissive (default: dna)
    #[argh(option)]
    pub alignment_mode: Option<String>,

    /// per-locus search timeout in seconds
    #[argh(option)]
    pub timeout: Option<f64>,

    /// call only loci matching regex pattern
    #[argh(option)]
    pub include_loci: Option<String>,

    /// skip loci matching regex pattern
    #[argh(option)]
    pub exclude_loci: Option<String>,
}

#[derive(FromArgs)]
/// extend partial calls and add novel alleles to the schema
#[argh(subcommand, name = "update")]
pub struct UpdateArgs {
    /// directory of allele FASTA files, one per locus
    #[argh(option, short = 'a')]
    pub alleles: String,

    /// directory of JSON call records (rewritten in place)
    #[argh(option, short = 'j')]
    pub json: String,

    /// directory of the genome FASTA files the records were called from
    #[argh(option, short = 'g')]
    pub genomes: String,

    /// largest shortfall in bases a partial call may have to be extended (default: 10)
    #[argh(option, short = 't')]
    pub threshold: Option<usize>,

    /// minimum identity of an extended hit (0.0-1.0, default: 0.90)
    #[argh(option)]
    pub identity_floor: Option<f64>,

    /// leave novel sequences as new calls instead of numbering them
    #[argh(switch)]
    pub no_append: bool,
}

#[derive(FromArgs)]
/// merge JSON call records into one genome x locus table
#[argh(subcommand, name = "tabulate")]
pub struct TabulateArgs {
    /// directory of JSON call records
    #[argh(option, short = 'j')]
    pub json: String,

    /// output table file, or - for stdout (default: stdout)
    #[argh(option, short = 'o')]
    pub output: Option<String>,

    /// single-character column delimiter; \t and tab mean a tab (default: tab)
    #[argh(option, short = 'd')]
    pub delimiter: Option<String>,

    /// include only loci matching regex pattern
    #[argh(option)]
    pub include_loci: Option<String>,

    /// exclude loci matching regex pattern
    #[argh(option)]
    pub exclude_loci: Option<String>,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Call(_) => "call",
            Command::Update(_) => "update",
            Command::Tabulate(_) => "tabulate",
        }
    }
}
