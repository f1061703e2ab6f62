//! CityHash128, version 1.0.2.
//!
//! Frame checksums must match the server bit for bit, and the server pins
//! this exact (older) revision of the algorithm. Later CityHash releases
//! produce different values.

const K0: u64 = 0xc3a5c85c97cb3127;
const K1: u64 = 0xb492b66fbe98f273;
const K2: u64 = 0x9ae16a3b2f90404f;
const K3: u64 = 0xc949d7c7509e6557;
const K_MUL: u64 = 0x9ddfea08eb382d69;

/// 128-bit hash as `(low, high)` halves.
pub type Hash128 = (u64, u64);

fn fetch64(s: &[u8], at: usize) -> u64 {
    let mut word = [0u8; 8];
    word.copy_from_slice(&s[at..at + 8]);
    u64::from_le_bytes(word)
}

fn fetch32(s: &[u8], at: usize) -> u64 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&s[at..at + 4]);
    u32::from_le_bytes(word) as u64
}

fn rotate(val: u64, shift: u32) -> u64 {
    if shift == 0 { val } else { val.rotate_right(shift) }
}

fn shift_mix(val: u64) -> u64 {
    val ^ (val >> 47)
}

fn hash128_to_64(low: u64, high: u64) -> u64 {
    let mut a = (low ^ high).wrapping_mul(K_MUL);
    a ^= a >> 47;
    let mut b = (high ^ a).wrapping_mul(K_MUL);
    b ^= b >> 47;
    b.wrapping_mul(K_MUL)
}

fn hash_len16(u: u64, v: u64) -> u64 {
    hash128_to_64(u, v)
}

fn hash_len0_to16(s: &[u8]) -> u64 {
    let len = s.len();
    if len > 8 {
        let a = fetch64(s, 0);
        let b = fetch64(s, len - 8);
        // len is 9..=16, so the rotation is never by zero
        return hash_len16(a, b.wrapping_add(len as u64).rotate_right(len as u32)) ^ b;
    }
    if len >= 4 {
        let a = fetch32(s, 0);
        return hash_len16((len as u64).wrapping_add(a << 3), fetch32(s, len - 4));
    }
    if len > 0 {
        let a = s[0] as u32;
        let b = s[len >> 1] as u32;
        let c = s[len - 1] as u32;
        let y = a.wrapping_add(b << 8);
        let z = (len as u32).wrapping_add(c << 2);
        return shift_mix((y as u64).wrapping_mul(K2) ^ (z as u64).wrapping_mul(K3))
            .wrapping_mul(K2);
    }
    K2
}

fn weak_hash_len32_with_seeds(
    w: u64,
    x: u64,
    y: u64,
    z: u64,
    mut a: u64,
    mut b: u64,
) -> (u64, u64) {
    a = a.wrapping_add(w);
    b = rotate(b.wrapping_add(a).wrapping_add(z), 21);
    let c = a;
    a = a.wrapping_add(x);
    a = a.wrapping_add(y);
    b = b.wrapping_add(rotate(a, 44));
    (a.wrapping_add(z), b.wrapping_add(c))
}

fn weak_hash_at(s: &[u8], at: usize, a: u64, b: u64) -> (u64, u64) {
    weak_hash_len32_with_seeds(
        fetch64(s, at),
        fetch64(s, at + 8),
        fetch64(s, at + 16),
        fetch64(s, at + 24),
        a,
        b,
    )
}

fn city_murmur(s: &[u8], seed: Hash128) -> Hash128 {
    let len = s.len();
    let mut a = seed.0;
    let mut b = seed.1;
    let mut c;
    let mut d;

    if len <= 16 {
        a = shift_mix(a.wrapping_mul(K1)).wrapping_mul(K1);
        c = b.wrapping_mul(K1).wrapping_add(hash_len0_to16(s));
        d = shift_mix(a.wrapping_add(if len >= 8 { fetch64(s, 0) } else { c }));
    } else {
        c = hash_len16(fetch64(s, len - 8).wrapping_add(K1), a);
        d = hash_len16(
            b.wrapping_add(len as u64),
            c.wrapping_add(fetch64(s, len - 16)),
        );
        a = a.wrapping_add(d);
        let mut at = 0;
        let mut remaining = len as isize - 16;
        loop {
            a ^= shift_mix(fetch64(s, at).wrapping_mul(K1)).wrapping_mul(K1);
            a = a.wrapping_mul(K1);
            b ^= a;
            c ^= shift_mix(fetch64(s, at + 8).wrapping_mul(K1)).wrapping_mul(K1);
            c = c.wrapping_mul(K1);
            d ^= c;
            at += 16;
            remaining -= 16;
            if remaining <= 0 {
                break;
            }
        }
    }
    a = hash_len16(a, c);
    b = hash_len16(d, b);
    (a ^ b, hash_len16(b, a))
}

fn city_hash128_with_seed(s: &[u8], seed: Hash128) -> Hash128 {
    if s.len() < 128 {
        return city_murmur(s, seed);
    }

    let mut len = s.len();
    let mut x = seed.0;
    let mut y = seed.1;
    let mut z = (len as u64).wrapping_mul(K1);
    let mut v: (u64, u64) = (0, 0);
    let mut w: (u64, u64) = (0, 0);
    v.0 = rotate(y ^ K1, 49).wrapping_mul(K1).wrapping_add(fetch64(s, 0));
    v.1 = rotate(v.0, 42).wrapping_mul(K1).wrapping_add(fetch64(s, 8));
    w.0 = rotate(y.wrapping_add(z), 35).wrapping_mul(K1).wrapping_add(x);
    w.1 = rotate(x.wrapping_add(fetch64(s, 88)), 53).wrapping_mul(K1);

    let mut at = 0;
    loop {
        for _ in 0..2 {
            x = rotate(
                x.wrapping_add(y)
                    .wrapping_add(v.0)
                    .wrapping_add(fetch64(s, at + 16)),
                37,
            )
            .wrapping_mul(K1);
            y = rotate(y.wrapping_add(v.1).wrapping_add(fetch64(s, at + 48)), 42).wrapping_mul(K1);
            x ^= w.1;
            y ^= v.0;
            z = rotate(z ^ w.0, 33);
            v = weak_hash_at(s, at, v.1.wrapping_mul(K1), x.wrapping_add(w.0));
            w = weak_hash_at(s, at + 32, z.wrapping_add(w.1), y);
            std::mem::swap(&mut z, &mut x);
            at += 64;
        }
        len -= 128;
        if len < 128 {
            break;
        }
    }

    y = y.wrapping_add(rotate(w.0, 37).wrapping_mul(K0).wrapping_add(z));
    x = x.wrapping_add(rotate(v.0.wrapping_add(z), 49).wrapping_mul(K0));

    // hash up to four 32-byte chunks from the end; the last one may reach
    // back before `at`, into bytes the loop above already consumed
    let end = at + len;
    let mut tail_done = 0;
    while tail_done < len {
        tail_done += 32;
        y = rotate(y.wrapping_sub(x), 42)
            .wrapping_mul(K0)
            .wrapping_add(v.1);
        w.0 = w.0.wrapping_add(fetch64(s, end - tail_done + 16));
        x = rotate(x, 49).wrapping_mul(K0).wrapping_add(w.0);
        w.0 = w.0.wrapping_add(v.0);
        v = weak_hash_at(s, end - tail_done, v.0, v.1);
    }

    x = hash_len16(x, v.0);
    y = hash_len16(y, w.0);
    (
        hash_len16(x.wrapping_add(v.1), w.1).wrapping_add(y),
        hash_len16(x.wrapping_add(w.1), y.wrapping_add(v.1)),
    )
}

pub fn city_hash128(s: &[u8]) -> Hash128 {
    let len = s.len();
    if len >= 16 {
        city_hash128_with_seed(&s[16..], (fetch64(s, 0) ^ K3, fetch64(s, 8)))
    } else if len >= 8 {
        city_hash128_with_seed(
            &[],
            (
                fetch64(s, 0) ^ (len as u64).wrapping_mul(K0),
                fetch64(s, len - 8) ^ K1,
            ),
        )
    } else {
        city_hash128_with_seed(s, (K0, K1))
    }
}

/// Hash as it appears on the wire: low half then high half, both little-endian.
pub fn checksum_bytes(s: &[u8]) -> [u8; 16] {
    let (low, high) = city_hash128(s);
    let mut out = [0u8; 16];
    out[..8].copy_from_slice(&low.to_le_bytes());
    out[8..].copy_from_slice(&high.to_le_bytes());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_across_calls() {
        for len in [0usize, 3, 7, 8, 15, 16, 17, 64, 127, 128, 129, 200, 1000] {
            let data: Vec<u8> = (0..len).map(|i| (i * 31 % 251) as u8).collect();
            assert_eq!(city_hash128(&data), city_hash128(&data), "len {len}");
        }
    }

    #[test]
    fn single_bit_changes_hash() {
        for len in [1usize, 12, 40, 130, 300] {
            let data = vec![0x5au8; len];
            let mut flipped = data.clone();
            flipped[len / 2] ^= 1;
            assert_ne!(city_hash128(&data), city_hash128(&flipped), "len {len}");
        }
    }

    #[test]
    fn known_answers() {
        let vectors: [(usize, u64, u64); 13] = [
            (0, 0x3df09dfc64c09a2b, 0x3cb540c392e51e29),
            (3, 0x6473720e9e25546d, 0x55ad3d94ab5ba66b),
            (7, 0x2b10aba75d97da2d, 0xbd3a37170971ff49),
            (8, 0x8e7cf242a241c273, 0xaa643fb72007a5ba),
            (15, 0x554ca5c50cf16c1a, 0xd5c3f2121c3c87e7),
            (16, 0x17940e0b74a93764, 0xc1cef72a803123eb),
            (17, 0x0390b413948a7266, 0xfcd42d37e6d38034),
            (64, 0x8494973b60c138d1, 0xef25d78c7d736f3a),
            (127, 0x914dda37066b13bc, 0xf56be1ac13892b4d),
            (128, 0x48174d5201884046, 0xa2a2738d3fe044ee),
            (143, 0xace29f35f1ed4c9d, 0x0a99a9272e26a7d3),
            (144, 0xe7ef2351c718d253, 0x96e8ae9db081dc97),
            (200, 0x7b966c8c3f36186c, 0xf2f551341282843e),
        ];
        for (len, low, high) in vectors {
            let data: Vec<u8> = (0..len).map(|i| (i * 31 % 251) as u8).collect();
            assert_eq!(city_hash128(&data), (low, high), "len {len}");
        }
    }

    #[test]
    fn wire_layout_is_low_then_high() {
        let data = b"frame payload";
        let (low, high) = city_hash128(data);
        let bytes = checksum_bytes(data);
        assert_eq!(&bytes[..8], &low.to_le_bytes());
        assert_eq!(&bytes[8..], &high.to_le_bytes());
    }
}
