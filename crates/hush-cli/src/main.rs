//! hush command line
//!
//! Key tooling, message sealing, and a relay listener for debugging
//! signaling traffic.

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};

use hush_call::{CallConfig, IceServer};
use hush_crypto::{
    ConversationCryptoManager, EncryptedPayload, KeyService, PrivateKey, PublicKey, SymmetricKey,
};
use hush_relay::{SignalingRelay, WsTransport};
use hush_types::{EnvelopeKind, UserId, WrappedKey};

#[derive(Parser)]
#[command(name = "hush")]
#[command(author, version, about = "End-to-end encrypted messaging and calls")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate an RSA-OAEP key pair
    Keygen,

    /// Generate a conversation key and wrap it for a recipient
    Wrap {
        /// Recipient's base64 SPKI public key
        #[arg(long)]
        public_key: String,

        #[arg(long)]
        recipient: String,
    },

    /// Recover a conversation key with your private key
    Unwrap {
        /// base64 PKCS#8 private key
        #[arg(long, env = "HUSH_PRIVATE_KEY", hide_env_values = true)]
        private_key: String,

        /// base64 ciphertext from the `wrapped.ciphertext` field of `wrap`
        #[arg(long)]
        wrapped: String,
    },

    /// Encrypt a message under a conversation key
    Encrypt {
        #[arg(long)]
        key: String,

        text: String,
    },

    /// Decrypt a message
    Decrypt {
        #[arg(long)]
        key: String,

        #[arg(long)]
        ciphertext: String,

        #[arg(long)]
        iv: String,
    },

    /// Print the ICE servers calls would use
    Ice,

    /// Connect to the relay and log every envelope
    Listen {
        #[arg(long, env = "HUSH_RELAY_URL")]
        url: String,

        #[arg(long, env = "HUSH_USER_ID")]
        user: String,

        #[arg(
            long,
            env = "HUSH_RELAY_TOKEN",
            default_value = "",
            hide_env_values = true
        )]
        token: String,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct KeyPairOut {
    public_key: String,
    private_key: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WrapOut {
    key: String,
    wrapped: WrappedKey,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SealedOut {
    ciphertext: String,
    iv: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Logs go to stderr; stdout carries command output
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hush=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let keys = KeyService::new();

    match cli.command {
        Commands::Keygen => print_json(&keygen(&keys).await?)?,
        Commands::Wrap {
            public_key,
            recipient,
        } => print_json(&wrap_key(&keys, &public_key, &recipient)?)?,
        Commands::Unwrap {
            private_key,
            wrapped,
        } => println!("{}", unwrap_key(&keys, &private_key, &wrapped)?),
        Commands::Encrypt { key, text } => print_json(&seal(&key, &text)?)?,
        Commands::Decrypt {
            key,
            ciphertext,
            iv,
        } => println!("{}", open(&key, &ciphertext, &iv)?),
        Commands::Ice => print_json(&ice_servers())?,
        Commands::Listen { url, user, token } => {
            listen(&url, UserId::from(user), &token).await?
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn keygen(keys: &KeyService) -> anyhow::Result<KeyPairOut> {
    let pair = keys.generate_asymmetric_key_pair().await?;
    Ok(KeyPairOut {
        public_key: pair.public.to_base64()?,
        private_key: pair.private.to_base64()?,
    })
}

fn wrap_key(keys: &KeyService, public_key: &str, recipient: &str) -> anyhow::Result<WrapOut> {
    let public = PublicKey::from_base64(public_key)?;
    let key = keys.generate_symmetric_key()?;
    let wrapped = keys.wrap_symmetric_key(&key, &UserId::from(recipient), &public)?;
    Ok(WrapOut {
        key: key.to_base64(),
        wrapped,
    })
}

fn unwrap_key(keys: &KeyService, private_key: &str, wrapped: &str) -> anyhow::Result<String> {
    let private = PrivateKey::from_base64(private_key)?;
    Ok(keys.unwrap_ciphertext(wrapped, &private)?.to_base64())
}

fn seal(key: &str, text: &str) -> anyhow::Result<SealedOut> {
    let key = SymmetricKey::from_base64(key)?;
    let (ciphertext, iv) = ConversationCryptoManager::encrypt(text, &key)?.to_base64();
    Ok(SealedOut { ciphertext, iv })
}

fn open(key: &str, ciphertext: &str, iv: &str) -> anyhow::Result<String> {
    let key = SymmetricKey::from_base64(key)?;
    let payload = EncryptedPayload::from_base64(ciphertext, iv)?;
    Ok(ConversationCryptoManager::decrypt(&payload, &key)?)
}

fn ice_servers() -> Vec<IceServer> {
    CallConfig::from_env().ice_servers
}

async fn listen(url: &str, user: UserId, token: &str) -> anyhow::Result<()> {
    let (transport, events) = WsTransport::connect(url, token).await?;
    let relay = SignalingRelay::new(user.clone(), transport, events);
    info!("Listening on {} as {}", url, user);

    let _subscriptions: Vec<_> = EnvelopeKind::ALL
        .into_iter()
        .map(|kind| {
            relay.subscribe(kind, move |envelope| {
                match serde_json::to_string(envelope) {
                    Ok(json) => info!(%kind, "{}", json),
                    Err(e) => warn!(%kind, "Unprintable envelope: {}", e),
                }
            })
        })
        .collect();

    let mut connection = relay.connection_state();
    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Interrupted"),
        _ = connection.wait_for(|connected| !connected) => warn!("Relay connection closed"),
    }

    Ok(())
}
