use crate::utils::nom_helper::{
    nom_unsigned_four_bytes, nom_unsigned_one_byte, nom_unsigned_two_bytes, Endian,
};

/// Resident form header, follows the common attribute header
#[derive(Debug)]
pub(crate) struct Resident {
    pub(crate) value_size: u32,
    /**Relative to the attribute start */
    pub(crate) value_offset: u16,
    pub(crate) indexed_flag: u8,
}

impl Resident {
    pub(crate) fn parse_resident(data: &[u8]) -> nom::IResult<&[u8], Resident> {
        let (input, value_size) = nom_unsigned_four_bytes(data, Endian::Le)?;
        let (input, value_offset) = nom_unsigned_two_bytes(input, Endian::Le)?;
        let (input, indexed_flag) = nom_unsigned_one_byte(input, Endian::Le)?;
        let (input, _padding) = nom_unsigned_one_byte(input, Endian::Le)?;

        let resident = Resident {
            value_size,
            value_offset,
            indexed_flag,
        };

        Ok((input, resident))
    }

    /// The attribute value out of the full attribute bytes
    pub(crate) fn value<'a>(&self, attribute: &'a [u8]) -> &'a [u8] {
        let start = self.value_offset as usize;
        let end = start + self.value_size as usize;
        if end > attribute.len() {
            return &[];
        }

        &attribute[start..end]
    }
}

#[cfg(test)]
mod tests {
    use super::Resident;

    #[test]
    fn test_parse_resident() {
        let test = [4, 0, 0, 0, 24, 0, 0, 0];
        let (_, result) = Resident::parse_resident(&test).unwrap();
        assert_eq!(result.value_size, 4);
        assert_eq!(result.value_offset, 24);
        assert_eq!(result.indexed_flag, 0);
    }

    #[test]
    fn test_value() {
        let mut attribute = vec![0u8; 24];
        attribute.extend_from_slice(&[1, 2, 3, 4]);

        let resident = Resident {
            value_size: 4,
            value_offset: 24,
            indexed_flag: 0,
        };
        assert_eq!(resident.value(&attribute), &[1, 2, 3, 4]);

        let truncated = Resident {
            value_size: 64,
            value_offset: 24,
            indexed_flag: 0,
        };
        assert!(truncated.value(&attribute).is_empty());
    }
}
