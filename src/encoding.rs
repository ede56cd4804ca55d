//! Canonical binary encoding for parameters, keys and ciphertexts.
//!
//! Every big integer is written as a `u64` byte count followed by its
//! minimal big-endian bytes (zero is the single byte `0x00`). Sequences are
//! written as a `u64` element count followed by the elements. Decoding
//! rejects non-minimal integers and oversized length prefixes, and
//! validated decoding of [`GroupParams`] re-checks every group invariant.

use ark_serialize::{
    CanonicalDeserialize, CanonicalSerialize, Compress, Read, SerializationError, Valid, Validate,
    Write,
};
use num_bigint::BigUint;
use zeroize::Zeroize;

use crate::ddh::{Ciphertext, FunctionKey, MasterPublicKey, MasterSecretKey};
use crate::ddh_multi::{MultiFunctionKey, MultiMasterPublicKey, MultiMasterSecretKey, WeightMatrix};
use crate::error::FeError;
use crate::params::GroupParams;
use crate::security::SecretVector;

/// Largest accepted encoding of a single integer (a 524288-bit value).
pub const MAX_UINT_BYTES: usize = 1 << 16;

/// Largest accepted element count of an encoded sequence.
pub const MAX_SEQUENCE_LEN: usize = 1 << 24;

/// Serializes `value` into a fresh buffer.
pub fn to_bytes<T: CanonicalSerialize>(value: &T) -> Result<Vec<u8>, FeError> {
    let mut bytes = Vec::with_capacity(value.compressed_size());
    value.serialize_compressed(&mut bytes)?;
    Ok(bytes)
}

/// Deserializes and validates a value that must span all of `bytes`.
///
/// # Errors
/// Returns `Serialization` on truncated, non-canonical or invalid input, or
/// if bytes are left over
pub fn from_bytes<T: CanonicalDeserialize>(mut bytes: &[u8]) -> Result<T, FeError> {
    let value = T::deserialize_compressed(&mut bytes)?;
    if !bytes.is_empty() {
        return Err(FeError::Serialization(format!(
            "{} trailing bytes after value",
            bytes.len()
        )));
    }
    Ok(value)
}

pub(crate) fn write_uint<W: Write>(
    value: &BigUint,
    mut writer: W,
    compress: Compress,
) -> Result<(), SerializationError> {
    let mut bytes = value.to_bytes_be();
    let result = (bytes.len() as u64)
        .serialize_with_mode(&mut writer, compress)
        .and_then(|()| writer.write_all(&bytes).map_err(SerializationError::from));
    bytes.zeroize();
    result
}

pub(crate) fn read_uint<R: Read>(
    mut reader: R,
    compress: Compress,
    validate: Validate,
) -> Result<BigUint, SerializationError> {
    let len = u64::deserialize_with_mode(&mut reader, compress, validate)?;
    let len = usize::try_from(len)
        .ok()
        .filter(|&len| len > 0 && len <= MAX_UINT_BYTES)
        .ok_or(SerializationError::InvalidData)?;

    let mut bytes = vec![0u8; len];
    reader.read_exact(&mut bytes)?;
    // minimal encoding only
    if len > 1 && bytes[0] == 0 {
        bytes.zeroize();
        return Err(SerializationError::InvalidData);
    }
    let value = BigUint::from_bytes_be(&bytes);
    bytes.zeroize();
    Ok(value)
}

pub(crate) fn uint_size(value: &BigUint) -> usize {
    8 + ((value.bits() + 7) / 8).max(1) as usize
}

pub(crate) fn write_uints<W: Write>(
    values: &[BigUint],
    mut writer: W,
    compress: Compress,
) -> Result<(), SerializationError> {
    (values.len() as u64).serialize_with_mode(&mut writer, compress)?;
    values
        .iter()
        .try_for_each(|v| write_uint(v, &mut writer, compress))
}

pub(crate) fn read_uints<R: Read>(
    mut reader: R,
    compress: Compress,
    validate: Validate,
) -> Result<Vec<BigUint>, SerializationError> {
    let len = read_len(&mut reader, compress, validate)?;
    (0..len)
        .map(|_| read_uint(&mut reader, compress, validate))
        .collect()
}

pub(crate) fn uints_size(values: &[BigUint]) -> usize {
    8 + values.iter().map(uint_size).sum::<usize>()
}

fn read_len<R: Read>(
    reader: R,
    compress: Compress,
    validate: Validate,
) -> Result<usize, SerializationError> {
    let len = u64::deserialize_with_mode(reader, compress, validate)?;
    usize::try_from(len)
        .ok()
        .filter(|&len| len <= MAX_SEQUENCE_LEN)
        .ok_or(SerializationError::InvalidData)
}

fn write_seq<T: CanonicalSerialize, W: Write>(
    items: &[T],
    mut writer: W,
    compress: Compress,
) -> Result<(), SerializationError> {
    (items.len() as u64).serialize_with_mode(&mut writer, compress)?;
    items
        .iter()
        .try_for_each(|item| item.serialize_with_mode(&mut writer, compress))
}

fn read_seq<T: CanonicalDeserialize, R: Read>(
    mut reader: R,
    compress: Compress,
    validate: Validate,
) -> Result<Vec<T>, SerializationError> {
    let len = read_len(&mut reader, compress, validate)?;
    (0..len)
        .map(|_| T::deserialize_with_mode(&mut reader, compress, validate))
        .collect()
}

fn seq_size<T: CanonicalSerialize>(items: &[T], compress: Compress) -> usize {
    8 + items
        .iter()
        .map(|item| item.serialized_size(compress))
        .sum::<usize>()
}

impl CanonicalSerialize for GroupParams {
    fn serialize_with_mode<W: Write>(
        &self,
        mut writer: W,
        compress: Compress,
    ) -> Result<(), SerializationError> {
        write_uint(&self.p, &mut writer, compress)?;
        write_uint(&self.q, &mut writer, compress)?;
        write_uint(&self.g, &mut writer, compress)?;
        (self.vec_len as u64).serialize_with_mode(&mut writer, compress)?;
        write_uint(&self.bound, &mut writer, compress)
    }

    fn serialized_size(&self, _compress: Compress) -> usize {
        uint_size(&self.p) + uint_size(&self.q) + uint_size(&self.g) + 8 + uint_size(&self.bound)
    }
}

impl CanonicalDeserialize for GroupParams {
    fn deserialize_with_mode<R: Read>(
        mut reader: R,
        compress: Compress,
        validate: Validate,
    ) -> Result<Self, SerializationError> {
        let p = read_uint(&mut reader, compress, validate)?;
        let q = read_uint(&mut reader, compress, validate)?;
        let g = read_uint(&mut reader, compress, validate)?;
        let vec_len = u64::deserialize_with_mode(&mut reader, compress, validate)?;
        let vec_len = usize::try_from(vec_len).map_err(|_| SerializationError::InvalidData)?;
        let bound = read_uint(&mut reader, compress, validate)?;

        let params = GroupParams {
            p,
            q,
            g,
            vec_len,
            bound,
        };
        if matches!(validate, Validate::Yes) {
            params.check()?;
        }
        Ok(params)
    }
}

impl Valid for GroupParams {
    fn check(&self) -> Result<(), SerializationError> {
        self.check_group()
            .and_then(|()| self.check_range(1))
            .map_err(|_| SerializationError::InvalidData)
    }
}

impl CanonicalSerialize for MasterSecretKey {
    fn serialize_with_mode<W: Write>(
        &self,
        writer: W,
        compress: Compress,
    ) -> Result<(), SerializationError> {
        self.s.serialize_with_mode(writer, compress)
    }

    fn serialized_size(&self, compress: Compress) -> usize {
        self.s.serialized_size(compress)
    }
}

impl CanonicalDeserialize for MasterSecretKey {
    fn deserialize_with_mode<R: Read>(
        reader: R,
        compress: Compress,
        validate: Validate,
    ) -> Result<Self, SerializationError> {
        let s = SecretVector::deserialize_with_mode(reader, compress, validate)?;
        Ok(MasterSecretKey { s })
    }
}

impl Valid for MasterSecretKey {
    fn check(&self) -> Result<(), SerializationError> {
        self.s.check()
    }
}

impl CanonicalSerialize for MasterPublicKey {
    fn serialize_with_mode<W: Write>(
        &self,
        writer: W,
        compress: Compress,
    ) -> Result<(), SerializationError> {
        write_uints(&self.elements, writer, compress)
    }

    fn serialized_size(&self, _compress: Compress) -> usize {
        uints_size(&self.elements)
    }
}

impl CanonicalDeserialize for MasterPublicKey {
    fn deserialize_with_mode<R: Read>(
        reader: R,
        compress: Compress,
        validate: Validate,
    ) -> Result<Self, SerializationError> {
        Ok(MasterPublicKey {
            elements: read_uints(reader, compress, validate)?,
        })
    }
}

impl Valid for MasterPublicKey {
    fn check(&self) -> Result<(), SerializationError> {
        Ok(())
    }
}

impl CanonicalSerialize for Ciphertext {
    fn serialize_with_mode<W: Write>(
        &self,
        mut writer: W,
        compress: Compress,
    ) -> Result<(), SerializationError> {
        write_uint(&self.c0, &mut writer, compress)?;
        write_uints(&self.ct, &mut writer, compress)
    }

    fn serialized_size(&self, _compress: Compress) -> usize {
        uint_size(&self.c0) + uints_size(&self.ct)
    }
}

impl CanonicalDeserialize for Ciphertext {
    fn deserialize_with_mode<R: Read>(
        mut reader: R,
        compress: Compress,
        validate: Validate,
    ) -> Result<Self, SerializationError> {
        let c0 = read_uint(&mut reader, compress, validate)?;
        let ct = read_uints(&mut reader, compress, validate)?;
        Ok(Ciphertext { c0, ct })
    }
}

impl Valid for Ciphertext {
    fn check(&self) -> Result<(), SerializationError> {
        Ok(())
    }
}

impl CanonicalSerialize for FunctionKey {
    fn serialize_with_mode<W: Write>(
        &self,
        writer: W,
        compress: Compress,
    ) -> Result<(), SerializationError> {
        write_uint(&self.key, writer, compress)
    }

    fn serialized_size(&self, _compress: Compress) -> usize {
        uint_size(&self.key)
    }
}

impl CanonicalDeserialize for FunctionKey {
    fn deserialize_with_mode<R: Read>(
        reader: R,
        compress: Compress,
        validate: Validate,
    ) -> Result<Self, SerializationError> {
        Ok(FunctionKey {
            key: read_uint(reader, compress, validate)?,
        })
    }
}

impl Valid for FunctionKey {
    fn check(&self) -> Result<(), SerializationError> {
        Ok(())
    }
}

impl CanonicalSerialize for MultiMasterPublicKey {
    fn serialize_with_mode<W: Write>(
        &self,
        writer: W,
        compress: Compress,
    ) -> Result<(), SerializationError> {
        write_seq(&self.keys, writer, compress)
    }

    fn serialized_size(&self, compress: Compress) -> usize {
        seq_size(&self.keys, compress)
    }
}

impl CanonicalDeserialize for MultiMasterPublicKey {
    fn deserialize_with_mode<R: Read>(
        reader: R,
        compress: Compress,
        validate: Validate,
    ) -> Result<Self, SerializationError> {
        Ok(MultiMasterPublicKey {
            keys: read_seq(reader, compress, validate)?,
        })
    }
}

impl Valid for MultiMasterPublicKey {
    fn check(&self) -> Result<(), SerializationError> {
        Ok(())
    }
}

impl CanonicalSerialize for MultiMasterSecretKey {
    fn serialize_with_mode<W: Write>(
        &self,
        mut writer: W,
        compress: Compress,
    ) -> Result<(), SerializationError> {
        write_seq(&self.keys, &mut writer, compress)?;
        write_seq(&self.otps, &mut writer, compress)
    }

    fn serialized_size(&self, compress: Compress) -> usize {
        seq_size(&self.keys, compress) + seq_size(&self.otps, compress)
    }
}

impl CanonicalDeserialize for MultiMasterSecretKey {
    fn deserialize_with_mode<R: Read>(
        mut reader: R,
        compress: Compress,
        validate: Validate,
    ) -> Result<Self, SerializationError> {
        let keys = read_seq(&mut reader, compress, validate)?;
        let otps = read_seq(&mut reader, compress, validate)?;
        let msk = MultiMasterSecretKey { keys, otps };
        if matches!(validate, Validate::Yes) {
            msk.check()?;
        }
        Ok(msk)
    }
}

impl Valid for MultiMasterSecretKey {
    fn check(&self) -> Result<(), SerializationError> {
        if self.keys.len() != self.otps.len() {
            return Err(SerializationError::InvalidData);
        }
        Ok(())
    }
}

impl CanonicalSerialize for MultiFunctionKey {
    fn serialize_with_mode<W: Write>(
        &self,
        mut writer: W,
        compress: Compress,
    ) -> Result<(), SerializationError> {
        write_seq(&self.keys, &mut writer, compress)?;
        write_uint(&self.otp_key, &mut writer, compress)
    }

    fn serialized_size(&self, compress: Compress) -> usize {
        seq_size(&self.keys, compress) + uint_size(&self.otp_key)
    }
}

impl CanonicalDeserialize for MultiFunctionKey {
    fn deserialize_with_mode<R: Read>(
        mut reader: R,
        compress: Compress,
        validate: Validate,
    ) -> Result<Self, SerializationError> {
        let keys = read_seq(&mut reader, compress, validate)?;
        let otp_key = read_uint(&mut reader, compress, validate)?;
        Ok(MultiFunctionKey { keys, otp_key })
    }
}

impl Valid for MultiFunctionKey {
    fn check(&self) -> Result<(), SerializationError> {
        Ok(())
    }
}

impl CanonicalSerialize for WeightMatrix {
    fn serialize_with_mode<W: Write>(
        &self,
        mut writer: W,
        compress: Compress,
    ) -> Result<(), SerializationError> {
        (self.num_rows() as u64).serialize_with_mode(&mut writer, compress)?;
        self.rows()
            .iter()
            .try_for_each(|row| write_uints(row, &mut writer, compress))
    }

    fn serialized_size(&self, _compress: Compress) -> usize {
        8 + self.rows().iter().map(|row| uints_size(row)).sum::<usize>()
    }
}

impl CanonicalDeserialize for WeightMatrix {
    fn deserialize_with_mode<R: Read>(
        mut reader: R,
        compress: Compress,
        validate: Validate,
    ) -> Result<Self, SerializationError> {
        let len = read_len(&mut reader, compress, validate)?;
        let rows = (0..len)
            .map(|_| read_uints(&mut reader, compress, validate))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(WeightMatrix::new(rows))
    }
}

impl Valid for WeightMatrix {
    fn check(&self) -> Result<(), SerializationError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchemeConfig;
    use crate::ddh::Ddh;
    use crate::ddh_multi::MultiDdh;
    use crate::utils::to_biguint_vec;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn toy_params() -> GroupParams {
        GroupParams::from_parts(
            BigUint::from(23u32),
            BigUint::from(11u32),
            BigUint::from(4u32),
            2,
            BigUint::from(2u32),
        )
        .unwrap()
    }

    #[test]
    fn test_integer_layout() {
        let key = FunctionKey {
            key: BigUint::from(0x0102u32),
        };
        assert_eq!(to_bytes(&key).unwrap(), vec![2, 0, 0, 0, 0, 0, 0, 0, 0x01, 0x02]);

        let zero = FunctionKey {
            key: BigUint::default(),
        };
        assert_eq!(to_bytes(&zero).unwrap(), vec![1, 0, 0, 0, 0, 0, 0, 0, 0x00]);
        assert_eq!(from_bytes::<FunctionKey>(&to_bytes(&zero).unwrap()).unwrap(), zero);
    }

    #[test]
    fn test_rejects_non_canonical_integers() {
        // leading zero byte
        let padded = [2u8, 0, 0, 0, 0, 0, 0, 0, 0x00, 0x05];
        assert!(matches!(
            from_bytes::<FunctionKey>(&padded),
            Err(FeError::Serialization(_))
        ));

        // empty integer
        let empty = [0u8; 8];
        assert!(from_bytes::<FunctionKey>(&empty).is_err());

        // length prefix beyond the cap
        let mut huge = ((MAX_UINT_BYTES as u64) + 1).to_le_bytes().to_vec();
        huge.push(1);
        assert!(from_bytes::<FunctionKey>(&huge).is_err());
    }

    #[test]
    fn test_truncated_and_trailing_input() {
        let c = Ciphertext {
            c0: BigUint::from(9u32),
            ct: to_biguint_vec(&[3, 18]),
        };
        let bytes = to_bytes(&c).unwrap();
        assert_eq!(bytes.len(), c.compressed_size());
        assert_eq!(from_bytes::<Ciphertext>(&bytes).unwrap(), c);

        assert!(from_bytes::<Ciphertext>(&bytes[..bytes.len() - 1]).is_err());

        let mut extended = bytes.clone();
        extended.push(0);
        assert!(matches!(
            from_bytes::<Ciphertext>(&extended),
            Err(FeError::Serialization(_))
        ));
    }

    #[test]
    fn test_params_are_validated_on_decode() {
        let params = toy_params();
        let bytes = to_bytes(&params).unwrap();
        assert_eq!(from_bytes::<GroupParams>(&bytes).unwrap(), params);

        // swap in a generator of the full group
        let mut tampered = params.clone();
        tampered.g = BigUint::from(5u32);
        let bytes = to_bytes(&tampered).unwrap();
        assert!(from_bytes::<GroupParams>(&bytes).is_err());

        let unchecked = GroupParams::deserialize_compressed_unchecked(&bytes[..]).unwrap();
        assert_eq!(unchecked, tampered);
    }

    #[test]
    fn test_single_input_values_survive_transport() {
        let mut rng = StdRng::seed_from_u64(30);
        let ddh = Ddh::new(&SchemeConfig::new(3), &mut rng).unwrap();
        let (msk, mpk) = ddh.generate_master_keys(&mut rng);
        let x = to_biguint_vec(&[5, 2, 9]);
        let y = to_biguint_vec(&[1, 0, 4]);
        let c = ddh.encrypt(&x, &mpk, &mut rng).unwrap();
        let fk = ddh.derive_key(&msk, &y).unwrap();

        let params: GroupParams = from_bytes(&to_bytes(ddh.params()).unwrap()).unwrap();
        let msk2: MasterSecretKey = from_bytes(&to_bytes(&msk).unwrap()).unwrap();
        let mpk2: MasterPublicKey = from_bytes(&to_bytes(&mpk).unwrap()).unwrap();
        let c2: Ciphertext = from_bytes(&to_bytes(&c).unwrap()).unwrap();
        let fk2: FunctionKey = from_bytes(&to_bytes(&fk).unwrap()).unwrap();
        assert_eq!(msk2, msk);
        assert_eq!(mpk2, mpk);

        let remote = Ddh::from_params(std::sync::Arc::new(params)).unwrap();
        assert_eq!(remote.decrypt(&c2, &fk2, &y).unwrap(), BigUint::from(41u32));
        assert_eq!(remote.derive_key(&msk2, &y).unwrap(), fk);
    }

    #[test]
    fn test_multi_input_values_survive_transport() {
        let mut rng = StdRng::seed_from_u64(31);
        let config = SchemeConfig::new(2)
            .with_bound(BigUint::from(16u32))
            .with_slots(2);
        let scheme = MultiDdh::new(&config, &mut rng).unwrap();
        let (mpk, msk) = scheme.generate_master_keys(&mut rng);
        let y = WeightMatrix::repeated(&to_biguint_vec(&[1, 1]), 2);

        let msk2: MultiMasterSecretKey = from_bytes(&to_bytes(&msk).unwrap()).unwrap();
        let mpk2: MultiMasterPublicKey = from_bytes(&to_bytes(&mpk).unwrap()).unwrap();
        let y2: WeightMatrix = from_bytes(&to_bytes(&y).unwrap()).unwrap();
        assert_eq!(msk2, msk);
        assert_eq!(mpk2, mpk);
        assert_eq!(y2, y);

        let xs = [to_biguint_vec(&[3, 1]), to_biguint_vec(&[2, 4])];
        let ciphers: Vec<Ciphertext> = scheme
            .clients()
            .iter()
            .zip(xs.iter())
            .map(|(client, x)| {
                let slot = client.slot();
                client
                    .encrypt(x, mpk2.slot(slot).unwrap(), msk2.client_otp(slot).unwrap(), &mut rng)
                    .unwrap()
            })
            .collect();

        let fk = scheme.derive_key(&msk2, &y2).unwrap();
        let fk2: MultiFunctionKey = from_bytes(&to_bytes(&fk).unwrap()).unwrap();
        assert_eq!(fk2, fk);
        assert_eq!(scheme.decrypt(&ciphers, &fk2, &y2).unwrap(), BigUint::from(10u32));
    }

    #[test]
    fn test_multi_secret_key_shape_checked() {
        let mut rng = StdRng::seed_from_u64(32);
        let config = SchemeConfig::new(2).with_slots(2);
        let scheme = MultiDdh::new(&config, &mut rng).unwrap();
        let (_, mut msk) = scheme.generate_master_keys(&mut rng);
        msk.otps.pop();

        let bytes = to_bytes(&msk).unwrap();
        assert!(from_bytes::<MultiMasterSecretKey>(&bytes).is_err());
    }
}
