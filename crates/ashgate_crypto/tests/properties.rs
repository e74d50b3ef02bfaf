//! Property tests for the crypto primitives.

use ashgate_crypto::{adler32, Adler32, RsaKey, XteaKey};
use proptest::prelude::*;

proptest! {
    #[test]
    fn xtea_decrypt_inverts_encrypt(
        key in any::<[u32; 4]>(),
        blocks in prop::collection::vec(any::<[u8; 8]>(), 0..64),
    ) {
        let key = XteaKey(key);
        let original: Vec<u8> = blocks.concat();
        let mut data = original.clone();

        key.encrypt(&mut data).unwrap();
        key.decrypt(&mut data).unwrap();
        prop_assert_eq!(data, original);
    }

    #[test]
    fn adler32_split_anywhere(data in prop::collection::vec(any::<u8>(), 0..20_000), cut in any::<prop::sample::Index>()) {
        let at = cut.index(data.len() + 1);
        let mut sum = Adler32::new();
        sum.update(&data[..at]);
        sum.update(&data[at..]);
        prop_assert_eq!(sum.finish(), adler32(&data));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn rsa_decode_inverts_encode(message in prop::collection::vec(any::<u8>(), 1..=127)) {
        let key = RsaKey::builtin().unwrap();
        // Minimal big-endian form, which is what decode hands back.
        let start = message.iter().position(|&b| b != 0).unwrap_or(message.len());
        let expected = &message[start..];

        let mut buf = [0u8; 128];
        buf[..message.len()].copy_from_slice(&message);

        let encoded = key.encode(&mut buf, message.len()).unwrap();
        let decoded = key.decode(&mut buf, encoded).unwrap();
        prop_assert_eq!(&buf[..decoded], expected);
    }
}
