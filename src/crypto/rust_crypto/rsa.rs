//! RSA public key operations using RustCrypto.

use num_bigint::BigUint;
use rand::rngs::OsRng;
use rsa::{Pkcs1v15Encrypt, RsaPublicKey};

use crate::buffer::Buf;
use crate::crypto::provider::RsaMethod;

#[derive(Debug)]
pub(super) struct RustCryptoRsa;

impl RsaMethod for RustCryptoRsa {
    fn encrypt_pkcs1(
        &self,
        modulus: &[u8],
        exponent: &[u8],
        data: &[u8],
        out: &mut Buf,
    ) -> Result<(), String> {
        let key = RsaPublicKey::new(
            rsa::BigUint::from_bytes_be(modulus),
            rsa::BigUint::from_bytes_be(exponent),
        )
        .map_err(|e| format!("Invalid RSA public key: {e}"))?;

        let encrypted = key
            .encrypt(&mut OsRng, Pkcs1v15Encrypt, data)
            .map_err(|e| format!("RSA encryption failed: {e}"))?;

        out.clear();
        out.extend_from_slice(&encrypted);
        Ok(())
    }

    fn public_raw(
        &self,
        modulus: &[u8],
        exponent: &[u8],
        input: &[u8],
        out: &mut Buf,
    ) -> Result<(), String> {
        let n = BigUint::from_bytes_be(modulus);
        let e = BigUint::from_bytes_be(exponent);
        let m = BigUint::from_bytes_be(input);

        if n.bits() == 0 {
            return Err("Empty RSA modulus".to_string());
        }
        if m >= n {
            return Err("RSA input out of range".to_string());
        }

        let c = m.modpow(&e, &n).to_bytes_be();

        // Strip leading zero bytes of the modulus encoding before sizing.
        let k = modulus.iter().skip_while(|b| **b == 0).count();
        if c.len() > k {
            return Err("RSA result larger than modulus".to_string());
        }

        out.clear();
        out.resize(k - c.len(), 0);
        out.extend_from_slice(&c);
        Ok(())
    }
}

pub(super) static RSA: RustCryptoRsa = RustCryptoRsa;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn raw_public_op_small_numbers() {
        // 3^7 mod 33 = 2187 mod 33 = 9
        let mut out = Buf::new();
        RSA.public_raw(&[33], &[7], &[3], &mut out).unwrap();
        assert_eq!(&*out, &[9]);
    }

    #[test]
    fn raw_public_op_left_pads() {
        // 2^3 mod 0x0101 = 8, padded to the two byte modulus
        let mut out = Buf::new();
        RSA.public_raw(&[0x00, 0x01, 0x01], &[3], &[2], &mut out)
            .unwrap();
        assert_eq!(&*out, &[0x00, 0x08]);
    }

    #[test]
    fn input_out_of_range() {
        let mut out = Buf::new();
        assert!(RSA.public_raw(&[33], &[7], &[40], &mut out).is_err());
    }
}
