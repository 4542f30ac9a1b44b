use rand::Rng;

/// Maximum length of a container ID in bytes. The ID is embedded in the veth
/// interface names `i_<id>` and `o_<id>`, and the kernel caps interface
/// names at 15 bytes.
pub const MAX_ID_LEN: usize = 12;

/// Generate a random hex container ID (12 hex chars = 6 random bytes).
pub fn generate_id() -> String {
    let mut rng = rand::thread_rng();
    let bytes: Vec<u8> = (0..MAX_ID_LEN / 2).map(|_| rng.gen()).collect();
    hex_encode(&bytes)
}

/// Encode bytes as a lowercase hex string.
fn hex_encode(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        s.push_str(&format!("{b:02x}"));
    }
    s
}
