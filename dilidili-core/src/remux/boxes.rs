//! ISO base media box scanning for fragment splicing.

/// Size of a box header: 4-byte big-endian size plus 4-byte type.
pub const BOX_HEADER_SIZE: usize = 8;

/// Four-character type of the file-type box.
pub const FTYP: [u8; 4] = *b"ftyp";

/// Canonical file-type box written at the start of every spliced output.
///
/// Major brand `isom`, minor version `0x00000200`, compatible brands
/// `isom`, `mp41`, `dash`, `mse1`.
pub const CANONICAL_FTYP_BOX: [u8; 32] = [
    0x00, 0x00, 0x00, 0x20, // box size (32 bytes)
    b'f', b't', b'y', b'p', // box type
    b'i', b's', b'o', b'm', // major brand
    0x00, 0x00, 0x02, 0x00, // minor version
    b'i', b's', b'o', b'm', // compatible brands
    b'm', b'p', b'4', b'1', //
    b'd', b'a', b's', b'h', //
    b'm', b's', b'e', b'1', //
];

/// Header of one box inside a fragment buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoxHeader {
    /// Declared size including the 8-byte header
    pub size: u32,
    /// Four-character type code
    pub box_type: [u8; 4],
}

impl BoxHeader {
    /// A declared size below the header size cannot describe a real box.
    pub fn is_malformed(&self) -> bool {
        (self.size as usize) < BOX_HEADER_SIZE
    }

    pub fn is_ftyp(&self) -> bool {
        self.box_type == FTYP
    }
}

/// Reads the box header at `offset`, if eight bytes are available there.
pub fn read_box_header(data: &[u8], offset: usize) -> Option<BoxHeader> {
    let header = data.get(offset..offset.checked_add(BOX_HEADER_SIZE)?)?;
    Some(BoxHeader {
        size: u32::from_be_bytes([header[0], header[1], header[2], header[3]]),
        box_type: [header[4], header[5], header[6], header[7]],
    })
}

/// Returns the offset of the first box whose type is not `ftyp`.
///
/// Leading `ftyp` boxes are skipped using their declared sizes. The scan
/// stops early and returns the current offset when a box declares a size
/// below 8 bytes or when no more than 8 bytes remain to be examined. Buffers
/// shorter than one header yield 0. The result never exceeds `data.len()`.
pub fn find_first_non_ftyp_box(data: &[u8]) -> usize {
    if data.len() < BOX_HEADER_SIZE {
        return 0;
    }

    let mut pos = 0usize;
    while pos < data.len() - BOX_HEADER_SIZE {
        let Some(header) = read_box_header(data, pos) else {
            break;
        };
        if header.is_malformed() {
            tracing::debug!("Malformed box size {} at offset {}", header.size, pos);
            break;
        }
        if !header.is_ftyp() {
            return pos;
        }
        pos = pos.saturating_add(header.size as usize);
    }

    // An ftyp box may declare a size that runs past the end of the buffer.
    pos.min(data.len())
}
