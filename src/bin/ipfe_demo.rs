use clap::{Parser, Subcommand};
use num_bigint::BigUint;

use ddh_ipfe::config::{SchemeConfig, DEFAULT_BOUND, DEFAULT_MODULUS_BITS};
use ddh_ipfe::{encoding, utils, Ddh, FeError, MultiDdh, WeightMatrix};

#[derive(Parser, Debug)]
#[command(
    about = "Walk-through of DDH inner-product functional encryption",
    author,
    version
)]
struct Cli {
    /// Bit length of the safe prime modulus
    #[arg(long = "modulus-bits", default_value_t = DEFAULT_MODULUS_BITS, global = true)]
    modulus_bits: u64,

    /// Exclusive upper bound on every input coordinate
    #[arg(long = "bound", default_value_t = DEFAULT_BOUND, global = true)]
    bound: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// One encryptor, one weight vector
    Single {
        /// Input vector as comma-separated integers (e.g. 5,2,9)
        #[arg(long = "x")]
        x: String,

        /// Weight vector of the same length
        #[arg(long = "y")]
        y: String,
    },
    /// Several encryptors, one weight row per encryptor
    Multi {
        /// Input vector of one encryptor (repeat flag per encryptor)
        #[arg(long = "x", required = true)]
        x: Vec<String>,

        /// Weight row for the encryptor at the same position (repeat flag per encryptor)
        #[arg(long = "y", required = true)]
        y: Vec<String>,
    },
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    let result = match &cli.command {
        Command::Single { x, y } => run_single(&cli, x, y),
        Command::Multi { x, y } => run_multi(&cli, x, y),
    };
    if let Err(e) = result {
        eprintln!("ipfe-demo failed: {e}");
        std::process::exit(1);
    }
}

fn run_single(cli: &Cli, x: &str, y: &str) -> Result<(), FeError> {
    let x = utils::parse_vector(x)?;
    let y = utils::parse_vector(y)?;
    if x.len() != y.len() {
        return Err(FeError::DimensionMismatch {
            context: "weight vector",
            expected: x.len(),
            actual: y.len(),
        });
    }

    let config = SchemeConfig::new(x.len())
        .with_modulus_bits(cli.modulus_bits)
        .with_bound(BigUint::from(cli.bound));
    let mut rng = utils::os_rng()?;
    let ddh = Ddh::new(&config, &mut rng)?;
    let (msk, mpk) = ddh.generate_master_keys(&mut rng);

    println!("{}", ddh.params());
    println!("Master secret key: {}", msk.export());
    println!("Master public key: {}", mpk);

    let ct = ddh.encrypt(&x, &mpk, &mut rng)?;
    println!("Encrypted vector: {}", ct);
    println!("Encrypted vector (hex): {}", hex::encode(encoding::to_bytes(&ct)?));

    let fk = ddh.derive_key(&msk, &y)?;
    println!("Functional encryption key: {}", fk);

    let result = ddh.decrypt(&ct, &fk, &y)?;
    println!("Decrypted inner product: {}", result);
    report_check(&utils::inner_product(&x, &y), &result);
    Ok(())
}

fn run_multi(cli: &Cli, xs: &[String], ys: &[String]) -> Result<(), FeError> {
    let xs = xs
        .iter()
        .map(|x| utils::parse_vector(x))
        .collect::<Result<Vec<_>, _>>()?;
    let ys = ys
        .iter()
        .map(|y| utils::parse_vector(y))
        .collect::<Result<Vec<_>, _>>()?;
    if xs.len() != ys.len() {
        return Err(FeError::DimensionMismatch {
            context: "weight matrix rows",
            expected: xs.len(),
            actual: ys.len(),
        });
    }

    let expected = xs
        .iter()
        .zip(ys.iter())
        .fold(BigUint::default(), |acc, (x, y)| acc + utils::inner_product(x, y));

    let config = SchemeConfig::new(xs.first().map_or(0, Vec::len))
        .with_modulus_bits(cli.modulus_bits)
        .with_bound(BigUint::from(cli.bound))
        .with_slots(xs.len());
    let mut rng = utils::os_rng()?;
    let scheme = MultiDdh::new(&config, &mut rng)?;
    let (mpk, msk) = scheme.generate_master_keys(&mut rng);

    println!("{}", scheme.params());
    println!("\tEncryptors: {}", scheme.slots());
    for (slot, (key, pk)) in msk.keys.iter().zip(mpk.keys.iter()).enumerate() {
        println!("Encryptor {slot} master secret key: {}", key.export());
        println!("Encryptor {slot} master public key: {}", pk);
    }

    let mut ciphers = Vec::with_capacity(scheme.slots());
    for (client, x) in scheme.clients().iter().zip(xs.iter()) {
        let slot = client.slot();
        let pk = mpk
            .slot(slot)
            .ok_or_else(|| FeError::Parameter(format!("no public key for encryptor {slot}")))?;
        let otp = msk
            .client_otp(slot)
            .ok_or_else(|| FeError::Parameter(format!("no one-time pad for encryptor {slot}")))?;
        let ct = client.encrypt(x, pk, otp, &mut rng)?;
        println!("Encryptor {slot} encrypted vector: {}", ct);
        println!(
            "Encryptor {slot} encrypted vector (hex): {}",
            hex::encode(encoding::to_bytes(&ct)?)
        );
        ciphers.push(ct);
    }

    let y = WeightMatrix::new(ys);
    let fk = scheme.derive_key(&msk, &y)?;
    for (slot, key) in fk.keys.iter().enumerate() {
        println!("Functional encryption key {slot}: {}", key);
    }
    println!("One-time-pad key: {}", fk.otp_key);

    let result = scheme.decrypt(&ciphers, &fk, &y)?;
    println!("Decrypted inner product: {}", result);
    report_check(&expected, &result);
    Ok(())
}

fn report_check(expected: &BigUint, result: &BigUint) {
    if expected == result {
        println!("Inner product check passed");
    } else {
        println!("Inner product check failed: {} != {}", expected, result);
    }
}

fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "info".into()),
            )
            .try_init();
    });
}
