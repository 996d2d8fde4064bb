use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
    process::ExitCode,
};

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use ed25519_dalek::SigningKey;
use rand::{rngs::OsRng, RngCore};
use tracing_subscriber::EnvFilter;

use nos_ledger::{
    events::{EventSink, JsonlSink, MemorySink, TracingSink},
    store::FileStore,
    AccountId, Amount, Ledger, LedgerConfig, LedgerError, Memo,
};

/// Events are buffered during a call and published only once the state file
/// holding that call is on disk.
type HostLedger = Ledger<FileStore, MemorySink>;

//==================== CLI ====================//

#[derive(Parser)]
#[command(name = "nos", version, about = "BlockNet NOS ledger host")]
struct Cli {
    /// JSON config (token metadata, state and event paths)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Overrides `state_path` from the config
    #[arg(long, global = true)]
    state: Option<PathBuf>,
    /// Overrides `events_path` from the config
    #[arg(long, global = true)]
    events: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

/// Caller identity: the account is the ed25519 verifying key of this secret.
#[derive(Args)]
struct Signer {
    /// 32-byte ed25519 secret key in hex (64 hex chars)
    #[arg(long = "sk-hex")]
    sk_hex: String,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a keypair (sk.hex / pk.hex)
    Keygen {
        #[arg(long)]
        out_dir: PathBuf,
    },
    /// Deploy a fresh ledger; the signer becomes admin
    Init(Signer),

    TransferAdmin {
        #[command(flatten)]
        signer: Signer,
        new_admin: AccountId,
    },
    SetPaused {
        #[command(flatten)]
        signer: Signer,
        #[arg(action = ArgAction::Set)]
        paused: bool,
    },
    UpdateMintCap {
        #[command(flatten)]
        signer: Signer,
        cap: Amount,
    },
    Mint {
        #[command(flatten)]
        signer: Signer,
        recipient: AccountId,
        amount: Amount,
    },
    Burn {
        #[command(flatten)]
        signer: Signer,
        amount: Amount,
    },
    Approve {
        #[command(flatten)]
        signer: Signer,
        spender: AccountId,
        amount: Amount,
    },
    IncreaseAllowance {
        #[command(flatten)]
        signer: Signer,
        spender: AccountId,
        added: Amount,
    },
    DecreaseAllowance {
        #[command(flatten)]
        signer: Signer,
        spender: AccountId,
        subtracted: Amount,
    },
    Transfer {
        #[command(flatten)]
        signer: Signer,
        recipient: AccountId,
        amount: Amount,
        /// Optional memo (UTF-8, at most 34 bytes)
        #[arg(long)]
        memo: Option<String>,
    },
    TransferFrom {
        #[command(flatten)]
        signer: Signer,
        owner: AccountId,
        recipient: AccountId,
        amount: Amount,
    },
    Stake {
        #[command(flatten)]
        signer: Signer,
        amount: Amount,
    },
    Unstake {
        #[command(flatten)]
        signer: Signer,
        amount: Amount,
    },
    Delegate {
        #[command(flatten)]
        signer: Signer,
        delegatee: AccountId,
        amount: Amount,
    },
    Revoke {
        #[command(flatten)]
        signer: Signer,
        delegatee: AccountId,
    },

    Balance {
        account: AccountId,
    },
    StakedBalance {
        account: AccountId,
    },
    DelegatedStake {
        delegator: AccountId,
        delegatee: AccountId,
    },
    Allowance {
        owner: AccountId,
        spender: AccountId,
    },
    TotalSupply,
    MintCap,
    Admin,
    Paused,
    /// Name, symbol, decimals and token URI
    Metadata,
    /// Full state as JSON, with state root
    Snapshot,
    /// Re-check conservation and cap invariants
    Audit,
}

//==================== helpers ====================//

fn parse_signer(signer: &Signer) -> Result<AccountId> {
    let sk_bytes = hex::decode(signer.sk_hex.trim()).context("invalid --sk-hex")?;
    let arr: [u8; 32] = sk_bytes
        .as_slice()
        .try_into()
        .map_err(|_| anyhow::anyhow!("--sk-hex must be 32 bytes (64 hex chars)"))?;
    let sk = SigningKey::from_bytes(&arr);
    Ok(AccountId::from_verifying_key(&sk.verifying_key()))
}

fn write_all(p: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = p.parent() {
        fs::create_dir_all(parent).with_context(|| format!("mkdir {}", parent.display()))?;
    }
    let mut f = fs::File::create(p).with_context(|| format!("create {}", p.display()))?;
    f.write_all(bytes)
        .with_context(|| format!("write {}", p.display()))?;
    Ok(())
}

fn load_config(cli: &Cli) -> Result<LedgerConfig> {
    let mut config = match &cli.config {
        Some(path) => LedgerConfig::load(path)?,
        None => LedgerConfig::default(),
    };
    if let Some(state) = &cli.state {
        config.state_path = state.clone();
    }
    if let Some(events) = &cli.events {
        config.events_path = events.clone();
    }
    Ok(config)
}

fn open_ledger(config: &LedgerConfig) -> Result<HostLedger> {
    let store = FileStore::open(&config.state_path)?;
    Ok(Ledger::open(store, MemorySink::new(), config.metadata.clone()))
}

/// Persists the store, then publishes the buffered events. Runs while the
/// store still holds the state-file lock, so event lines land in commit
/// order.
fn commit(ledger: &mut HostLedger, config: &LedgerConfig) -> Result<()> {
    ledger.store().persist()?;
    let records = ledger.sink_mut().drain();
    if records.is_empty() {
        return Ok(());
    }
    let mut sinks = (
        JsonlSink::open(&config.events_path)
            .with_context(|| format!("open events {}", config.events_path.display()))?,
        TracingSink,
    );
    for record in &records {
        sinks.append(record);
    }
    Ok(())
}

fn open_deployed(config: &LedgerConfig) -> Result<HostLedger> {
    let ledger = open_ledger(config)?;
    if !ledger.is_deployed() {
        bail!(
            "no ledger at {}; run `nos init` first",
            config.state_path.display()
        );
    }
    Ok(ledger)
}

/// Runs one mutating call and persists the store when it commits.
fn mutate<T>(
    config: &LedgerConfig,
    signer: &Signer,
    f: impl FnOnce(&mut HostLedger, &AccountId) -> Result<T, LedgerError>,
) -> Result<T> {
    let caller = parse_signer(signer)?;
    let mut ledger = open_deployed(config)?;
    let value = f(&mut ledger, &caller)
        .map_err(|err| anyhow::anyhow!("{} ({})", err.code(), err))?;
    commit(&mut ledger, config)?;
    Ok(value)
}

//==================== commands ====================//

fn keygen_cmd(out_dir: &Path) -> Result<()> {
    fs::create_dir_all(out_dir).with_context(|| format!("mkdir {}", out_dir.display()))?;

    let mut sk_bytes = [0u8; 32];
    OsRng.fill_bytes(&mut sk_bytes);
    let sk = SigningKey::from_bytes(&sk_bytes);
    let pk = sk.verifying_key();

    write_all(&out_dir.join("sk.hex"), hex::encode(sk_bytes).as_bytes())?;
    write_all(&out_dir.join("pk.hex"), hex::encode(pk.as_bytes()).as_bytes())?;
    println!("account {}", AccountId::from_verifying_key(&pk));
    println!("keypair written → {}", out_dir.display());
    Ok(())
}

fn init_cmd(config: &LedgerConfig, signer: &Signer) -> Result<()> {
    let deployer = parse_signer(signer)?;
    let store = FileStore::open(&config.state_path)?;
    let mut ledger = Ledger::deploy(store, MemorySink::new(), config.metadata.clone(), &deployer)
        .map_err(|err| match err {
            LedgerError::NotAuthorized => anyhow::anyhow!(
                "ledger already deployed at {}",
                config.state_path.display()
            ),
            other => anyhow::anyhow!("{} ({})", other.code(), other),
        })?;
    commit(&mut ledger, config)?;
    println!("deployed {} → {}", ledger.symbol(), config.state_path.display());
    println!("admin {deployer}");
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    match &cli.command {
        Command::Keygen { out_dir } => keygen_cmd(out_dir)?,
        Command::Init(signer) => init_cmd(&config, signer)?,

        Command::TransferAdmin { signer, new_admin } => {
            mutate(&config, signer, |l, caller| l.transfer_admin(caller, new_admin))?;
            println!("admin → {new_admin}");
        }
        Command::SetPaused { signer, paused } => {
            let paused = mutate(&config, signer, |l, caller| l.set_paused(caller, *paused))?;
            println!("paused = {paused}");
        }
        Command::UpdateMintCap { signer, cap } => {
            let cap = mutate(&config, signer, |l, caller| l.update_mint_cap(caller, *cap))?;
            println!("mint cap = {cap}");
        }
        Command::Mint {
            signer,
            recipient,
            amount,
        } => {
            let minted = mutate(&config, signer, |l, caller| {
                l.mint(caller, recipient, *amount)
            })?;
            println!("minted {minted} → {recipient}");
        }
        Command::Burn { signer, amount } => {
            mutate(&config, signer, |l, caller| l.burn(caller, *amount))?;
            println!("burned {amount}");
        }
        Command::Approve {
            signer,
            spender,
            amount,
        } => {
            mutate(&config, signer, |l, caller| l.approve(caller, spender, *amount))?;
            println!("allowance = {amount}");
        }
        Command::IncreaseAllowance {
            signer,
            spender,
            added,
        } => {
            let allowance = mutate(&config, signer, |l, caller| {
                l.increase_allowance(caller, spender, *added)
            })?;
            println!("allowance = {allowance}");
        }
        Command::DecreaseAllowance {
            signer,
            spender,
            subtracted,
        } => {
            let allowance = mutate(&config, signer, |l, caller| {
                l.decrease_allowance(caller, spender, *subtracted)
            })?;
            println!("allowance = {allowance}");
        }
        Command::Transfer {
            signer,
            recipient,
            amount,
            memo,
        } => {
            match memo {
                Some(text) => {
                    let memo = Memo::new(text.as_bytes().to_vec())?;
                    mutate(&config, signer, |l, caller| {
                        l.transfer_with_memo(caller, recipient, *amount, memo)
                    })?
                }
                None => mutate(&config, signer, |l, caller| {
                    l.transfer(caller, recipient, *amount)
                })?,
            };
            println!("transferred {amount} → {recipient}");
        }
        Command::TransferFrom {
            signer,
            owner,
            recipient,
            amount,
        } => {
            mutate(&config, signer, |l, caller| {
                l.transfer_from(caller, owner, recipient, *amount)
            })?;
            println!("transferred {amount} from {owner} → {recipient}");
        }
        Command::Stake { signer, amount } => {
            mutate(&config, signer, |l, caller| l.stake(caller, *amount))?;
            println!("staked {amount}");
        }
        Command::Unstake { signer, amount } => {
            mutate(&config, signer, |l, caller| l.unstake(caller, *amount))?;
            println!("unstaked {amount}");
        }
        Command::Delegate {
            signer,
            delegatee,
            amount,
        } => {
            mutate(&config, signer, |l, caller| {
                l.delegate_stake(caller, delegatee, *amount)
            })?;
            println!("delegated {amount} → {delegatee}");
        }
        Command::Revoke { signer, delegatee } => {
            let amount = mutate(&config, signer, |l, caller| {
                l.revoke_delegation(caller, delegatee)
            })?;
            println!("revoked {amount} from {delegatee}");
        }

        Command::Balance { account } => println!("{}", open_deployed(&config)?.balance(account)),
        Command::StakedBalance { account } => {
            println!("{}", open_deployed(&config)?.staked_balance(account))
        }
        Command::DelegatedStake {
            delegator,
            delegatee,
        } => println!(
            "{}",
            open_deployed(&config)?.delegated_stake(delegator, delegatee)
        ),
        Command::Allowance { owner, spender } => {
            println!("{}", open_deployed(&config)?.allowance(owner, spender))
        }
        Command::TotalSupply => println!("{}", open_deployed(&config)?.total_supply()),
        Command::MintCap => println!("{}", open_deployed(&config)?.mint_cap()),
        Command::Admin => match open_deployed(&config)?.admin() {
            Some(admin) => println!("{admin}"),
            None => println!("-"),
        },
        Command::Paused => println!("{}", open_deployed(&config)?.is_paused()),
        Command::Metadata => {
            let ledger = open_deployed(&config)?;
            println!("name     {}", ledger.name());
            println!("symbol   {}", ledger.symbol());
            println!("decimals {}", ledger.decimals());
            println!("uri      {}", ledger.token_uri().unwrap_or("-"));
        }
        Command::Snapshot => {
            let snapshot = open_deployed(&config)?.snapshot();
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        Command::Audit => {
            let report = open_deployed(&config)?.audit();
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.is_consistent() {
                bail!("audit found {} violation(s)", report.violations.len());
            }
        }
    }
    Ok(())
}

//==================== main ====================//

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(2)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const X: AccountId = AccountId::from_bytes([0x11; 32]);

    fn config_in(dir: &Path) -> LedgerConfig {
        LedgerConfig {
            state_path: dir.join("nos.json"),
            events_path: dir.join("nos-events.jsonl"),
            ..LedgerConfig::default()
        }
    }

    fn deploy(config: &LedgerConfig, admin: &AccountId) {
        let store = FileStore::open(&config.state_path).unwrap();
        let mut ledger =
            Ledger::deploy(store, MemorySink::new(), config.metadata.clone(), admin).unwrap();
        commit(&mut ledger, config).unwrap();
    }

    #[test]
    fn events_are_published_after_the_state_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = config_in(dir.path());
        let admin = AccountId::from_bytes([0x0a; 32]);
        deploy(&config, &admin);

        let mut ledger = open_deployed(&config).unwrap();
        ledger.mint(&admin, &X, 25).unwrap();
        commit(&mut ledger, &config).unwrap();
        drop(ledger);

        let text = fs::read_to_string(&config.events_path).unwrap();
        assert_eq!(text.lines().count(), 1);
        assert!(text.contains("\"minted\""));
        assert_eq!(open_deployed(&config).unwrap().balance(&X), 25);
    }

    #[test]
    fn failed_persist_publishes_nothing() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = config_in(dir.path());
        let admin = AccountId::from_bytes([0x0a; 32]);
        deploy(&config, &admin);

        // a directory where the temp file goes makes the write fail
        fs::create_dir(dir.path().join("nos.json.tmp")).unwrap();
        let mut ledger = open_deployed(&config).unwrap();
        ledger.mint(&admin, &X, 25).unwrap();
        assert!(commit(&mut ledger, &config).is_err());
        drop(ledger);

        assert!(!config.events_path.exists());
        assert_eq!(open_deployed(&config).unwrap().balance(&X), 0);
    }
}
