use secrecy::SecretString;
use serde_json::json;
use stash_core::CryptoConfig;
use stash_crypto::{AuthenticatedCipher, KeyDerivation, Wallet, WalletKey, WalletOptions};

fn make_section(entries: usize) -> serde_json::Value {
    let map: serde_json::Map<String, serde_json::Value> = (0..entries)
        .map(|i| (format!("entry-{i}"), json!({"index": i, "note": "x".repeat(32)})))
        .collect();
    serde_json::Value::Object(map)
}

#[divan::bench]
fn bench_derive_id(bencher: divan::Bencher) {
    let kdf = KeyDerivation::from_config(&CryptoConfig::default()).unwrap();
    let password = SecretString::from("correct-horse".to_string());
    bencher.bench(|| {
        kdf.derive_id(divan::black_box("alice"), divan::black_box(&password))
            .unwrap()
    });
}

#[divan::bench(args = [1, 64, 1024])]
fn bench_encrypt_section(bencher: divan::Bencher, entries: usize) {
    let cipher = AuthenticatedCipher::default();
    let key = WalletKey::from_bytes([0xABu8; 32]);
    let section = make_section(entries);
    bencher.bench(|| {
        cipher
            .encrypt(divan::black_box(&section), divan::black_box(&key))
            .unwrap()
    });
}

#[divan::bench(args = [1, 64, 1024])]
fn bench_decrypt_wallet(bencher: divan::Bencher, entries: usize) {
    let cipher = AuthenticatedCipher::default();
    let key = WalletKey::from_bytes([0xABu8; 32]);
    let wallet = Wallet::new(WalletOptions {
        main_data: Some(make_section(entries)),
        ..WalletOptions::new("bench", key.clone())
    });
    let encrypted = wallet.encrypt(&cipher).unwrap();
    bencher.bench(|| {
        Wallet::decrypt(
            divan::black_box(&encrypted),
            "bench",
            key.clone(),
            &cipher,
        )
        .unwrap()
    });
}

fn main() {
    divan::main();
}
