//! sectorcrypt: sector-level file encryption and CMAC tagging
//!
//! Commands:
//!   encrypt / decrypt   - transform a file sector by sector (cmc, xts, heh, dec)
//!   mac                 - print the CMAC tag of a file
//!   verify              - check a CMAC tag, exit non-zero on mismatch
//!   keygen              - write random key material as hex
//!   config show         - display the effective configuration
//!
//! Key files hold hex text; whitespace is ignored.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use rand::RngCore;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use sector_core::config::{CipherKind, ModeKind, SectorConfig};
use sector_core::{Aes128, Aes256, Block, BlockCipher, Kuznyechik, SectorResult};
use sector_modes::{Cmac, Cmc, Dec, Heh, SectorAddress, TagSize, Verification, Xts};

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "sectorcrypt",
    version,
    about = "Sector-level disk encryption modes",
    long_about = "sectorcrypt: encrypt files sector by sector with CMC, XTS, HEH or DEC, and tag them with CMAC"
)]
struct Cli {
    /// Path to sectorcrypt.toml configuration file
    #[arg(long, short = 'c', env = "SECTORCRYPT_CONFIG", default_value = "sectorcrypt.toml")]
    config: PathBuf,

    /// Block cipher (overrides cipher.algorithm)
    #[arg(long, global = true)]
    cipher: Option<CipherKind>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "SECTORCRYPT_LOG", global = true)]
    log: Option<String>,

    /// Log format (json, text)
    #[arg(long, env = "SECTORCRYPT_LOG_FORMAT", global = true)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Encrypt a file sector by sector
    Encrypt(TransformArgs),

    /// Decrypt a file sector by sector
    Decrypt(TransformArgs),

    /// Compute a CMAC tag over a file
    Mac {
        #[arg(long, short = 'i')]
        input: PathBuf,
        /// Hex key file
        #[arg(long, short = 'k')]
        key: PathBuf,
        /// Tag size in bits: 64 or 128 (overrides mac.tag_bits)
        #[arg(long)]
        tag_bits: Option<u32>,
    },

    /// Verify a CMAC tag over a file
    Verify {
        #[arg(long, short = 'i')]
        input: PathBuf,
        #[arg(long, short = 'k')]
        key: PathBuf,
        /// Expected tag as hex
        #[arg(long, short = 't')]
        tag: String,
        #[arg(long)]
        tag_bits: Option<u32>,
    },

    /// Generate random key material
    Keygen {
        /// Key length in bytes (default: the configured cipher's key size)
        #[arg(long)]
        bytes: Option<usize>,
        /// Write to a file instead of stdout
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
}

#[derive(Args, Debug, Clone)]
struct TransformArgs {
    /// Mode (overrides sector.mode)
    #[arg(long, short = 'm')]
    mode: Option<ModeKind>,

    #[arg(long, short = 'i')]
    input: PathBuf,

    #[arg(long, short = 'o')]
    output: PathBuf,

    /// Hex key file: data key (cmc, xts, heh) or master key (dec)
    #[arg(long, short = 'k')]
    key: PathBuf,

    /// Hex tweak key file (cmc, xts)
    #[arg(long)]
    tweak_key: Option<PathBuf>,

    /// Sector size in bytes (overrides sector.size)
    #[arg(long)]
    sector_size: Option<usize>,

    /// Sector number of the first sector (overrides sector.first_sector)
    #[arg(long)]
    first_sector: Option<u64>,

    /// Partition id (dec)
    #[arg(long, default_value_t = 0)]
    partition: u64,

    /// Partition counter (dec)
    #[arg(long, default_value_t = 0)]
    partition_counter: u64,

    /// Sector counter (dec)
    #[arg(long, default_value_t = 0)]
    sector_counter: u64,
}

#[derive(Clone, Debug, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Direction {
    Encrypt,
    Decrypt,
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = load_config(&cli.config)?;
    if let Some(cipher) = cli.cipher {
        config.cipher.algorithm = cipher;
    }

    let level = cli.log.clone().unwrap_or_else(|| config.log.level.clone());
    let format = cli
        .log_format
        .clone()
        .unwrap_or_else(|| parse_log_format(&config.log.format));
    init_logging(&level, &format);

    if !cli.config.exists() {
        warn!("config file not found: {}  (using defaults)", cli.config.display());
    }
    debug!(cipher = %config.cipher.algorithm, "sectorcrypt starting");

    match cli.command {
        Commands::Encrypt(args) => cmd_transform(&config, &args, Direction::Encrypt),
        Commands::Decrypt(args) => cmd_transform(&config, &args, Direction::Decrypt),
        Commands::Mac { input, key, tag_bits } => cmd_mac(&config, &input, &key, tag_bits),
        Commands::Verify {
            input,
            key,
            tag,
            tag_bits,
        } => cmd_verify(&config, &input, &key, &tag, tag_bits),
        Commands::Keygen { bytes, output } => cmd_keygen(&config, bytes, output.as_deref()),
        Commands::Config {
            action: ConfigAction::Show,
        } => cmd_config_show(&config, &cli.config),
    }
}

// ── Config loading and logging ────────────────────────────────────────────────

fn load_config(path: &Path) -> Result<SectorConfig> {
    SectorConfig::load(path).with_context(|| format!("loading config: {}", path.display()))
}

/// `name` has passed `SectorConfig::validate`, so it is `json` or `text`.
fn parse_log_format(name: &str) -> LogFormat {
    match name {
        "json" => LogFormat::Json,
        _ => LogFormat::Text,
    }
}

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

// ── Key material ──────────────────────────────────────────────────────────────

fn read_key(path: &Path) -> Result<Zeroizing<Vec<u8>>> {
    let text = Zeroizing::new(
        std::fs::read_to_string(path)
            .with_context(|| format!("reading key file: {}", path.display()))?,
    );
    let compact: Zeroizing<String> =
        Zeroizing::new(text.chars().filter(|c| !c.is_whitespace()).collect());
    let bytes = hex::decode(compact.as_str())
        .with_context(|| format!("decoding hex key: {}", path.display()))?;
    Ok(Zeroizing::new(bytes))
}

fn key_size(cipher: CipherKind) -> usize {
    match cipher {
        CipherKind::Kuznyechik => Kuznyechik::KEY_SIZE,
        CipherKind::Aes128 => Aes128::KEY_SIZE,
        CipherKind::Aes256 => Aes256::KEY_SIZE,
    }
}

// ── `sectorcrypt encrypt` / `decrypt` ─────────────────────────────────────────

/// A mode with its keys scheduled once for the whole file.
enum Engine<C: BlockCipher> {
    Cmc(Cmc<C>),
    Xts(Xts<C>),
    Heh(Heh<C>),
    Dec {
        dec: Dec<C>,
        partition: u64,
        partition_counter: u64,
        sector_counter: u64,
    },
}

impl<C: BlockCipher> Engine<C> {
    fn build(mode: ModeKind, args: &TransformArgs) -> Result<Self> {
        let key = read_key(&args.key)?;
        let tweak_key = || -> Result<Zeroizing<Vec<u8>>> {
            match &args.tweak_key {
                Some(path) => read_key(path),
                None => bail!("{mode} requires --tweak-key"),
            }
        };
        let engine = match mode {
            ModeKind::Cmc => Engine::Cmc(Cmc::new(&key, &tweak_key()?)?),
            ModeKind::Xts => Engine::Xts(Xts::new(&key, &tweak_key()?)?),
            ModeKind::Heh => Engine::Heh(Heh::new(&key)?),
            ModeKind::Dec => Engine::Dec {
                dec: Dec::new(&key)?,
                partition: args.partition,
                partition_counter: args.partition_counter,
                sector_counter: args.sector_counter,
            },
        };
        Ok(engine)
    }

    fn apply(&self, direction: Direction, number: u64, sector: &mut [u8]) -> SectorResult<()> {
        match (self, direction) {
            (Engine::Cmc(cmc), Direction::Encrypt) => cmc.encrypt_in_place(number, sector),
            (Engine::Cmc(cmc), Direction::Decrypt) => cmc.decrypt_in_place(number, sector),
            (Engine::Xts(xts), Direction::Encrypt) => xts.encrypt_in_place(number, sector),
            (Engine::Xts(xts), Direction::Decrypt) => xts.decrypt_in_place(number, sector),
            (Engine::Heh(heh), Direction::Encrypt) => heh.encrypt_in_place(number, sector),
            (Engine::Heh(heh), Direction::Decrypt) => heh.decrypt_in_place(number, sector),
            (
                Engine::Dec {
                    dec,
                    partition,
                    partition_counter,
                    sector_counter,
                },
                _,
            ) => {
                let address = SectorAddress {
                    partition: *partition,
                    partition_counter: *partition_counter,
                    sector: number,
                    sector_counter: *sector_counter,
                };
                dec.encrypt_in_place(&address, sector)
            }
        }
    }
}

fn cmd_transform(config: &SectorConfig, args: &TransformArgs, direction: Direction) -> Result<()> {
    match config.cipher.algorithm {
        CipherKind::Kuznyechik => transform_file::<Kuznyechik>(config, args, direction)?,
        CipherKind::Aes128 => transform_file::<Aes128>(config, args, direction)?,
        CipherKind::Aes256 => transform_file::<Aes256>(config, args, direction)?,
    };
    Ok(())
}

/// Transform `args.input` into `args.output`; returns the number of sectors.
fn transform_file<C: BlockCipher>(
    config: &SectorConfig,
    args: &TransformArgs,
    direction: Direction,
) -> Result<u64> {
    let mode = args.mode.unwrap_or(config.sector.mode);
    let sector_size = args.sector_size.unwrap_or(config.sector.size);
    let first_sector = args.first_sector.unwrap_or(config.sector.first_sector);

    let mut layout = config.clone();
    layout.sector.mode = mode;
    layout.sector.size = sector_size;
    layout.validate().context("invalid sector layout")?;

    let engine = Engine::<C>::build(mode, args)?;

    let mut data = Zeroizing::new(
        std::fs::read(&args.input)
            .with_context(|| format!("reading input: {}", args.input.display()))?,
    );
    if data.len() % sector_size != 0 {
        bail!(
            "input is {} bytes, not a whole number of {sector_size}-byte sectors",
            data.len()
        );
    }

    let mut sectors = 0u64;
    for chunk in data.chunks_mut(sector_size) {
        let number = first_sector
            .checked_add(sectors)
            .context("sector number overflow")?;
        engine
            .apply(direction, number, chunk)
            .with_context(|| format!("sector {number}"))?;
        sectors += 1;
    }

    std::fs::write(&args.output, data.as_slice())
        .with_context(|| format!("writing output: {}", args.output.display()))?;

    info!(
        ?direction,
        %mode,
        cipher = %config.cipher.algorithm,
        sectors,
        sector_size,
        output = %args.output.display(),
        "done"
    );
    Ok(sectors)
}

// ── `sectorcrypt mac` / `verify` ──────────────────────────────────────────────

fn compute_tag<C: BlockCipher>(data: &[u8], key: &[u8], tag_size: TagSize) -> Result<Block> {
    let cmac = Cmac::<C>::new(key)?;
    Ok(cmac.digest(data, tag_size)?)
}

fn check_tag<C: BlockCipher>(
    data: &[u8],
    key: &[u8],
    tag: &Block,
    tag_size: TagSize,
) -> Result<Verification> {
    let cmac = Cmac::<C>::new(key)?;
    Ok(cmac.verify(data, tag, tag_size)?)
}

fn resolve_tag_size(config: &SectorConfig, tag_bits: Option<u32>) -> Result<TagSize> {
    Ok(TagSize::try_from(tag_bits.unwrap_or(config.mac.tag_bits))?)
}

/// Parse a hex tag of exactly `tag_size` bytes into a zero-padded block.
fn parse_tag(text: &str, tag_size: TagSize) -> Result<Block> {
    let bytes = hex::decode(text.trim()).context("decoding hex tag")?;
    if bytes.len() != tag_size.bytes() {
        bail!(
            "tag is {} bytes, expected {} for a {}-bit tag",
            bytes.len(),
            tag_size.bytes(),
            tag_size.bits()
        );
    }
    let mut tag = Block::ZERO;
    tag.0[..bytes.len()].copy_from_slice(&bytes);
    Ok(tag)
}

fn mac_file(config: &SectorConfig, input: &Path, key: &Path, tag_size: TagSize) -> Result<String> {
    let data = std::fs::read(input).with_context(|| format!("reading input: {}", input.display()))?;
    let key = read_key(key)?;
    let tag = match config.cipher.algorithm {
        CipherKind::Kuznyechik => compute_tag::<Kuznyechik>(&data, &key, tag_size)?,
        CipherKind::Aes128 => compute_tag::<Aes128>(&data, &key, tag_size)?,
        CipherKind::Aes256 => compute_tag::<Aes256>(&data, &key, tag_size)?,
    };
    Ok(hex::encode(&tag.0[..tag_size.bytes()]))
}

fn verify_file(
    config: &SectorConfig,
    input: &Path,
    key: &Path,
    tag: &str,
    tag_size: TagSize,
) -> Result<Verification> {
    let expected = parse_tag(tag, tag_size)?;
    let data = std::fs::read(input).with_context(|| format!("reading input: {}", input.display()))?;
    let key = read_key(key)?;
    match config.cipher.algorithm {
        CipherKind::Kuznyechik => check_tag::<Kuznyechik>(&data, &key, &expected, tag_size),
        CipherKind::Aes128 => check_tag::<Aes128>(&data, &key, &expected, tag_size),
        CipherKind::Aes256 => check_tag::<Aes256>(&data, &key, &expected, tag_size),
    }
}

fn cmd_mac(config: &SectorConfig, input: &Path, key: &Path, tag_bits: Option<u32>) -> Result<()> {
    let tag_size = resolve_tag_size(config, tag_bits)?;
    println!("{}", mac_file(config, input, key, tag_size)?);
    Ok(())
}

fn cmd_verify(
    config: &SectorConfig,
    input: &Path,
    key: &Path,
    tag: &str,
    tag_bits: Option<u32>,
) -> Result<()> {
    let tag_size = resolve_tag_size(config, tag_bits)?;
    match verify_file(config, input, key, tag, tag_size)? {
        Verification::Valid => {
            println!("valid");
            Ok(())
        }
        Verification::Invalid => {
            println!("invalid");
            bail!("CMAC tag does not match {}", input.display())
        }
    }
}

// ── `sectorcrypt keygen` ──────────────────────────────────────────────────────

fn generate_key(len: usize) -> Zeroizing<String> {
    let mut bytes = Zeroizing::new(vec![0u8; len]);
    rand::thread_rng().fill_bytes(&mut bytes);
    Zeroizing::new(hex::encode(bytes.as_slice()))
}

fn cmd_keygen(config: &SectorConfig, bytes: Option<usize>, output: Option<&Path>) -> Result<()> {
    let len = bytes.unwrap_or_else(|| key_size(config.cipher.algorithm));
    if len == 0 {
        bail!("key length must be at least one byte");
    }
    let key = generate_key(len);
    match output {
        Some(path) => {
            let line = Zeroizing::new(format!("{}\n", key.as_str()));
            std::fs::write(path, line.as_bytes())
                .with_context(|| format!("writing key: {}", path.display()))?;
            info!(bytes = len, path = %path.display(), "key written");
        }
        None => println!("{}", key.as_str()),
    }
    Ok(())
}

// ── `sectorcrypt config show` ─────────────────────────────────────────────────

fn cmd_config_show(config: &SectorConfig, config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!("# Configuration: defaults (no file at {})", config_path.display());
    }
    println!();
    let rendered = toml::to_string_pretty(config).context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}
