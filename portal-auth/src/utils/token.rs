use rand::Rng;

/// 256 bits from the thread-local CSPRNG, hex encoded (64 chars).
pub fn generate_random_token() -> String {
    let mut rng = rand::thread_rng();
    let token_bytes: [u8; 32] = rng.gen();
    hex::encode(token_bytes)
}
