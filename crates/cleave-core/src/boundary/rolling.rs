/// Sliding window length for the rolling hash.
pub const WINDOW_SIZE: usize = 48;

const PRIME: u64 = 16777619;

const fn prime_pow(exp: usize) -> u64 {
    let mut acc: u64 = 1;
    let mut i = 0;
    while i < exp {
        acc = acc.wrapping_mul(PRIME);
        i += 1;
    }
    acc
}

/// PRIME^(WINDOW_SIZE - 1), the weight of the byte leaving the window.
const OUTGOING_WEIGHT: u64 = prime_pow(WINDOW_SIZE - 1);

/// Rabin-style polynomial rolling hash over a fixed 48-byte window.
///
/// Once the window is full, the hash value depends only on the last
/// `WINDOW_SIZE` bytes seen, so candidate cut points are a pure function
/// of local content.
#[derive(Debug, Clone)]
pub struct RollingHash {
    hash: u64,
    window: [u8; WINDOW_SIZE],
    filled: usize,
    head: usize,
}

impl RollingHash {
    pub fn new() -> Self {
        Self {
            hash: 0,
            window: [0; WINDOW_SIZE],
            filled: 0,
            head: 0,
        }
    }

    pub fn roll(&mut self, byte: u8) {
        if self.filled == WINDOW_SIZE {
            let outgoing = u64::from(self.window[self.head]);
            self.hash = self
                .hash
                .wrapping_sub(outgoing.wrapping_mul(OUTGOING_WEIGHT))
                .wrapping_mul(PRIME)
                .wrapping_add(u64::from(byte));
        } else {
            self.hash = self.hash.wrapping_mul(PRIME).wrapping_add(u64::from(byte));
            self.filled += 1;
        }
        self.window[self.head] = byte;
        self.head = (self.head + 1) % WINDOW_SIZE;
    }

    pub fn value(&self) -> u64 {
        self.hash
    }
}

impl Default for RollingHash {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash_of(bytes: &[u8]) -> u64 {
        let mut hash = RollingHash::new();
        for &b in bytes {
            hash.roll(b);
        }
        hash.value()
    }

    #[test]
    fn depends_only_on_window() {
        let tail: Vec<u8> = (0..WINDOW_SIZE as u8).collect();

        let mut a = Vec::from(&b"some long prefix that should slide out entirely"[..]);
        a.extend_from_slice(&tail);
        let mut b = vec![0xAB; 200];
        b.extend_from_slice(&tail);

        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn distinct_windows_distinct_hashes() {
        let mut tail: Vec<u8> = (0..WINDOW_SIZE as u8).collect();
        let base = hash_of(&tail);
        tail[WINDOW_SIZE / 2] ^= 0x01;
        assert_ne!(base, hash_of(&tail));
    }

    #[test]
    fn deterministic() {
        let data: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
        assert_eq!(hash_of(&data), hash_of(&data));
    }
}
