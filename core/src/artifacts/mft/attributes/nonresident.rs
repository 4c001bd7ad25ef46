use crate::utils::nom_helper::{nom_unsigned_eight_bytes, nom_unsigned_two_bytes, Endian};

/// Non-resident form header, follows the common attribute header
#[derive(Debug)]
pub(crate) struct NonResident {
    pub(crate) first_vcn: u64,
    pub(crate) last_vcn: u64,
    /**Relative to the attribute start */
    pub(crate) data_runs_offset: u16,
    pub(crate) compression_unit: u16,
    pub(crate) allocated_size: u64,
    /**Only valid when `first_vcn` is zero */
    pub(crate) real_size: u64,
    /**Only valid when `first_vcn` is zero */
    pub(crate) initialized_size: u64,
}

impl NonResident {
    pub(crate) fn parse_nonresident(data: &[u8]) -> nom::IResult<&[u8], NonResident> {
        let (input, first_vcn) = nom_unsigned_eight_bytes(data, Endian::Le)?;
        let (input, last_vcn) = nom_unsigned_eight_bytes(input, Endian::Le)?;
        let (input, data_runs_offset) = nom_unsigned_two_bytes(input, Endian::Le)?;
        let (input, compression_unit) = nom_unsigned_two_bytes(input, Endian::Le)?;
        let (input, _padding) = nom_unsigned_two_bytes(input, Endian::Le)?;
        let (input, _padding) = nom_unsigned_two_bytes(input, Endian::Le)?;

        let (input, allocated_size) = nom_unsigned_eight_bytes(input, Endian::Le)?;
        let (input, real_size) = nom_unsigned_eight_bytes(input, Endian::Le)?;
        let (input, initialized_size) = nom_unsigned_eight_bytes(input, Endian::Le)?;

        let nonresident = NonResident {
            first_vcn,
            last_vcn,
            data_runs_offset,
            compression_unit,
            allocated_size,
            real_size,
            initialized_size,
        };

        Ok((input, nonresident))
    }
}

#[cfg(test)]
mod tests {
    use super::NonResident;

    #[test]
    fn test_parse_nonresident() {
        let mut test = Vec::new();
        test.extend_from_slice(&0u64.to_le_bytes());
        test.extend_from_slice(&15u64.to_le_bytes());
        test.extend_from_slice(&64u16.to_le_bytes());
        test.extend_from_slice(&0u16.to_le_bytes());
        test.extend_from_slice(&[0, 0, 0, 0]);
        test.extend_from_slice(&65536u64.to_le_bytes());
        test.extend_from_slice(&65011u64.to_le_bytes());
        test.extend_from_slice(&65011u64.to_le_bytes());

        let (_, result) = NonResident::parse_nonresident(&test).unwrap();
        assert_eq!(result.first_vcn, 0);
        assert_eq!(result.last_vcn, 15);
        assert_eq!(result.data_runs_offset, 64);
        assert_eq!(result.compression_unit, 0);
        assert_eq!(result.allocated_size, 65536);
        assert_eq!(result.real_size, 65011);
        assert_eq!(result.initialized_size, 65011);
    }
}
