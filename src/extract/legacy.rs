//! Legacy Word (`.doc`) text extraction.
//!
//! A `.doc` file is an OLE compound file (CFB) holding a `WordDocument`
//! stream plus a table stream. Text lives in pieces described by the
//! piece table (`Clx`/`PlcPcd`) in the table stream; each piece is
//! either CP-1252 or UTF-16LE. This extractor walks the container,
//! reconstructs the pieces in character-position order, and maps Word's
//! control characters onto plain text breaks.
//!
//! Every read is bounds-checked: malformed or truncated input yields an
//! [`ExtractError`], never a panic. Encrypted documents and fast-saved
//! exotica outside the Word 97+ layout are rejected the same way.

use super::ExtractError;

const CFB_MAGIC: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// Sector numbers at or above this value are chain markers, not data.
const MAX_REGULAR_SECTOR: u32 = 0xFFFF_FFFA;
const ENDOFCHAIN: u32 = 0xFFFF_FFFE;
const FREESECT: u32 = 0xFFFF_FFFF;

const DIR_ENTRY_SIZE: usize = 128;
const MINI_SECTOR_SIZE: usize = 64;

type DocResult<T> = Result<T, String>;

pub(crate) fn extract_doc(bytes: &[u8]) -> Result<String, ExtractError> {
    let container = CompoundFile::parse(bytes).map_err(ExtractError::Legacy)?;
    let word_stream = container
        .stream("WordDocument")
        .map_err(ExtractError::Legacy)?;
    extract_word_text(&word_stream, &container).map_err(ExtractError::Legacy)
}

// ── CFB container ──────────────────────────────────────────────────────

struct DirEntry {
    name: String,
    object_type: u8,
    start_sector: u32,
    size: u64,
}

struct CompoundFile<'a> {
    data: &'a [u8],
    sector_size: usize,
    fat: Vec<u32>,
    mini_fat: Vec<u32>,
    mini_cutoff: u32,
    mini_stream: Vec<u8>,
    entries: Vec<DirEntry>,
}

impl<'a> CompoundFile<'a> {
    fn parse(data: &'a [u8]) -> DocResult<Self> {
        if data.len() < 512 || data[..8] != CFB_MAGIC {
            return Err("not an OLE compound file".to_string());
        }

        let sector_shift = u16_at(data, 30)?;
        if sector_shift != 9 && sector_shift != 12 {
            return Err(format!("unsupported sector shift {}", sector_shift));
        }
        let sector_size = 1usize << sector_shift;
        if u16_at(data, 32)? != 6 {
            return Err("unsupported mini sector shift".to_string());
        }

        let first_dir_sector = u32_at(data, 48)?;
        let mini_cutoff = u32_at(data, 56)?;
        let first_mini_fat_sector = u32_at(data, 60)?;
        let first_difat_sector = u32_at(data, 68)?;

        // DIFAT: 109 entries in the header, then chained DIFAT sectors.
        let mut fat_sectors = Vec::new();
        for i in 0..109 {
            let sector = u32_at(data, 76 + i * 4)?;
            if sector < MAX_REGULAR_SECTOR {
                fat_sectors.push(sector);
            }
        }
        let entries_per_sector = sector_size / 4;
        let max_sectors = data.len() / sector_size + 1;
        let mut difat_sector = first_difat_sector;
        let mut difat_hops = 0usize;
        while difat_sector < MAX_REGULAR_SECTOR {
            if difat_hops > max_sectors {
                return Err("DIFAT chain cycle".to_string());
            }
            let raw = sector_bytes(data, sector_size, difat_sector)?;
            for i in 0..entries_per_sector - 1 {
                let sector = u32_at(raw, i * 4)?;
                if sector < MAX_REGULAR_SECTOR {
                    fat_sectors.push(sector);
                }
            }
            difat_sector = u32_at(raw, (entries_per_sector - 1) * 4)?;
            difat_hops += 1;
        }

        let mut fat = Vec::with_capacity(fat_sectors.len() * entries_per_sector);
        for sector in &fat_sectors {
            let raw = sector_bytes(data, sector_size, *sector)?;
            for chunk in raw.chunks_exact(4) {
                fat.push(u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
            }
        }

        let mut container = CompoundFile {
            data,
            sector_size,
            fat,
            mini_fat: Vec::new(),
            mini_cutoff,
            mini_stream: Vec::new(),
            entries: Vec::new(),
        };

        let dir_bytes = container.read_fat_chain(first_dir_sector)?;
        for raw in dir_bytes.chunks_exact(DIR_ENTRY_SIZE) {
            let name_len = u16_at(raw, 64)? as usize;
            if name_len < 2 || name_len > 64 {
                continue;
            }
            let units: Vec<u16> = raw[..name_len - 2]
                .chunks_exact(2)
                .map(|c| u16::from_le_bytes([c[0], c[1]]))
                .collect();
            container.entries.push(DirEntry {
                name: String::from_utf16_lossy(&units),
                object_type: raw[66],
                start_sector: u32_at(raw, 116)?,
                size: u64_at(raw, 120)?,
            });
        }

        // Root entry owns the mini stream; small streams live inside it.
        let root = container
            .entries
            .iter()
            .find(|e| e.object_type == 5)
            .map(|e| (e.start_sector, e.size));
        if let Some((start_sector, size)) = root {
            let mut mini = container.read_fat_chain(start_sector)?;
            mini.truncate(size as usize);
            container.mini_stream = mini;
        }
        let mini_fat_bytes = container.read_fat_chain(first_mini_fat_sector)?;
        container.mini_fat = mini_fat_bytes
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();

        Ok(container)
    }

    fn read_fat_chain(&self, start: u32) -> DocResult<Vec<u8>> {
        let mut out = Vec::new();
        let mut sector = start;
        let mut hops = 0usize;
        while sector < MAX_REGULAR_SECTOR {
            if hops > self.fat.len() {
                return Err("FAT chain cycle".to_string());
            }
            out.extend_from_slice(sector_bytes(self.data, self.sector_size, sector)?);
            sector = *self
                .fat
                .get(sector as usize)
                .ok_or_else(|| format!("sector {} missing from FAT", sector))?;
            hops += 1;
        }
        Ok(out)
    }

    fn read_mini_chain(&self, start: u32) -> DocResult<Vec<u8>> {
        let mut out = Vec::new();
        let mut sector = start;
        let mut hops = 0usize;
        while sector < MAX_REGULAR_SECTOR {
            if hops > self.mini_fat.len() {
                return Err("mini FAT chain cycle".to_string());
            }
            let offset = sector as usize * MINI_SECTOR_SIZE;
            let raw = self
                .mini_stream
                .get(offset..offset + MINI_SECTOR_SIZE)
                .ok_or_else(|| format!("mini sector {} out of range", sector))?;
            out.extend_from_slice(raw);
            sector = *self
                .mini_fat
                .get(sector as usize)
                .ok_or_else(|| format!("mini sector {} missing from mini FAT", sector))?;
            hops += 1;
        }
        Ok(out)
    }

    /// Read a named stream in full, honoring the mini-stream cutoff.
    fn stream(&self, name: &str) -> DocResult<Vec<u8>> {
        let entry = self
            .entries
            .iter()
            .find(|e| e.object_type == 2 && e.name == name)
            .ok_or_else(|| format!("stream {} not found", name))?;
        let mut bytes = if entry.size < self.mini_cutoff as u64 {
            self.read_mini_chain(entry.start_sector)?
        } else {
            self.read_fat_chain(entry.start_sector)?
        };
        if (bytes.len() as u64) < entry.size {
            return Err(format!("stream {} truncated", name));
        }
        bytes.truncate(entry.size as usize);
        Ok(bytes)
    }
}

fn sector_bytes(data: &[u8], sector_size: usize, sector: u32) -> DocResult<&[u8]> {
    let offset = (sector as usize + 1) * sector_size;
    data.get(offset..offset + sector_size)
        .ok_or_else(|| format!("sector {} out of range", sector))
}

fn u16_at(data: &[u8], offset: usize) -> DocResult<u16> {
    data.get(offset..offset + 2)
        .map(|b| u16::from_le_bytes([b[0], b[1]]))
        .ok_or_else(|| format!("truncated read at offset {}", offset))
}

fn u32_at(data: &[u8], offset: usize) -> DocResult<u32> {
    data.get(offset..offset + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| format!("truncated read at offset {}", offset))
}

fn u64_at(data: &[u8], offset: usize) -> DocResult<u64> {
    data.get(offset..offset + 8)
        .map(|b| u64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
        .ok_or_else(|| format!("truncated read at offset {}", offset))
}

// ── Word 97 layer ──────────────────────────────────────────────────────

/// Word file identifier at the start of the FIB.
const WORD_MAGIC: u16 = 0xA5EC;
/// Index of the `fcClx`/`lcbClx` pair within `FibRgFcLcb97`.
const CLX_PAIR_INDEX: usize = 33;

fn extract_word_text(word_stream: &[u8], container: &CompoundFile) -> DocResult<String> {
    if u16_at(word_stream, 0)? != WORD_MAGIC {
        return Err("WordDocument stream has no FIB magic".to_string());
    }
    let flags = u16_at(word_stream, 0x0A)?;
    if flags & 0x0100 != 0 {
        return Err("document is encrypted".to_string());
    }
    let table_name = if flags & 0x0200 != 0 { "1Table" } else { "0Table" };

    // Walk the variable-length FIB prefix to the FibRgFcLcb blob.
    let csw = u16_at(word_stream, 32)? as usize;
    let cslw_offset = 34 + csw * 2;
    let cslw = u16_at(word_stream, cslw_offset)? as usize;
    let cb_offset = cslw_offset + 2 + cslw * 4;
    let pair_count = u16_at(word_stream, cb_offset)? as usize;
    if pair_count <= CLX_PAIR_INDEX {
        return Err("FIB carries no piece table reference".to_string());
    }
    let blob = cb_offset + 2;
    let fc_clx = u32_at(word_stream, blob + CLX_PAIR_INDEX * 8)? as usize;
    let lcb_clx = u32_at(word_stream, blob + CLX_PAIR_INDEX * 8 + 4)? as usize;
    if lcb_clx == 0 {
        return Err("empty piece table".to_string());
    }

    let table_stream = container.stream(table_name)?;
    let clx = table_stream
        .get(fc_clx..fc_clx + lcb_clx)
        .ok_or_else(|| "piece table outside table stream".to_string())?;

    let raw = reconstruct_text(clx, word_stream)?;
    Ok(sanitize_word_text(&raw))
}

/// Walk the `Clx` to the `PlcPcd` and concatenate the text pieces.
fn reconstruct_text(clx: &[u8], word_stream: &[u8]) -> DocResult<String> {
    // Skip Prc property blocks preceding the Pcdt.
    let mut pos = 0usize;
    while clx.get(pos) == Some(&0x01) {
        let grpprl_len = u16_at(clx, pos + 1)? as usize;
        pos += 3 + grpprl_len;
    }
    if clx.get(pos) != Some(&0x02) {
        return Err("malformed Clx: Pcdt marker missing".to_string());
    }
    let plc_len = u32_at(clx, pos + 1)? as usize;
    let plc = clx
        .get(pos + 5..pos + 5 + plc_len)
        .ok_or_else(|| "PlcPcd extends past Clx".to_string())?;
    if plc_len < 4 + 12 || (plc_len - 4) % 12 != 0 {
        return Err("malformed PlcPcd length".to_string());
    }
    let piece_count = (plc_len - 4) / 12;

    let mut out = String::new();
    for i in 0..piece_count {
        let cp_start = u32_at(plc, i * 4)? as usize;
        let cp_end = u32_at(plc, (i + 1) * 4)? as usize;
        if cp_end < cp_start {
            return Err("piece character positions out of order".to_string());
        }
        let char_count = cp_end - cp_start;

        let pcd_offset = (piece_count + 1) * 4 + i * 8;
        let fc_raw = u32_at(plc, pcd_offset + 2)?;
        let compressed = fc_raw & 0x4000_0000 != 0;
        let fc = (fc_raw & 0x3FFF_FFFF) as usize;

        if compressed {
            let offset = fc / 2;
            let bytes = word_stream
                .get(offset..offset + char_count)
                .ok_or_else(|| "text piece outside WordDocument stream".to_string())?;
            out.extend(bytes.iter().map(|&b| cp1252_char(b)));
        } else {
            let bytes = word_stream
                .get(fc..fc + char_count * 2)
                .ok_or_else(|| "text piece outside WordDocument stream".to_string())?;
            let units: Vec<u16> = bytes
                .chunks_exact(2)
                .map(|c| u16::from_le_bytes([c[0], c[1]]))
                .collect();
            out.push_str(&String::from_utf16_lossy(&units));
        }
    }
    Ok(out)
}

/// Map Word's in-band control characters onto plain text. Paragraph,
/// cell, line-break, and page marks become newlines; field instructions
/// (between 0x13 and 0x14/0x15) are dropped.
fn sanitize_word_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut in_field_instruction = false;
    for c in raw.chars() {
        match c {
            '\u{0D}' | '\u{07}' | '\u{0B}' | '\u{0C}' => out.push('\n'),
            '\u{09}' => out.push('\t'),
            '\u{13}' => in_field_instruction = true,
            '\u{14}' | '\u{15}' => in_field_instruction = false,
            '\u{1E}' => out.push('-'),
            '\u{1F}' => {}
            '\u{A0}' => out.push(' '),
            c if (c as u32) < 0x20 => {}
            c => {
                if !in_field_instruction {
                    out.push(c);
                }
            }
        }
    }
    out
}

/// CP-1252 to Unicode. The 0x80–0x9F block differs from Latin-1; the
/// rest maps directly.
fn cp1252_char(b: u8) -> char {
    match b {
        0x80 => '€',
        0x82 => '‚',
        0x83 => 'ƒ',
        0x84 => '„',
        0x85 => '…',
        0x86 => '†',
        0x87 => '‡',
        0x88 => 'ˆ',
        0x89 => '‰',
        0x8A => 'Š',
        0x8B => '‹',
        0x8C => 'Œ',
        0x8E => 'Ž',
        0x91 => '‘',
        0x92 => '’',
        0x93 => '“',
        0x94 => '”',
        0x95 => '•',
        0x96 => '–',
        0x97 => '—',
        0x98 => '˜',
        0x99 => '™',
        0x9A => 'š',
        0x9B => '›',
        0x9C => 'œ',
        0x9E => 'ž',
        0x9F => 'Ÿ',
        0x81 | 0x8D | 0x8F | 0x90 | 0x9D => '\u{FFFD}',
        b => b as char,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn put_u16(buf: &mut [u8], offset: usize, value: u16) {
        buf[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
    }

    fn put_u32(buf: &mut [u8], offset: usize, value: u32) {
        buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    fn dir_entry(name: &str, object_type: u8, start_sector: u32, size: u32) -> [u8; 128] {
        let mut entry = [0u8; 128];
        let mut offset = 0;
        for unit in name.encode_utf16() {
            entry[offset..offset + 2].copy_from_slice(&unit.to_le_bytes());
            offset += 2;
        }
        put_u16(&mut entry, 64, (name.len() as u16 + 1) * 2);
        entry[66] = object_type;
        put_u32(&mut entry, 68, FREESECT);
        put_u32(&mut entry, 72, FREESECT);
        put_u32(&mut entry, 76, FREESECT);
        put_u32(&mut entry, 116, start_sector);
        put_u32(&mut entry, 120, size);
        entry
    }

    /// Build a minimal .doc: one FAT sector, one directory sector, then
    /// a 4096-byte WordDocument stream and a 4096-byte 0Table stream
    /// holding a two-piece piece table (CP-1252 + UTF-16).
    fn minimal_doc(ascii_piece: &str, utf16_piece: &str) -> Vec<u8> {
        let sector = 512usize;
        let mut file = vec![0u8; sector * 19]; // header + 18 sectors

        // Header
        file[..8].copy_from_slice(&CFB_MAGIC);
        put_u16(&mut file, 24, 0x003E);
        put_u16(&mut file, 26, 3);
        put_u16(&mut file, 28, 0xFFFE);
        put_u16(&mut file, 30, 9); // 512-byte sectors
        put_u16(&mut file, 32, 6); // 64-byte mini sectors
        put_u32(&mut file, 44, 1); // one FAT sector
        put_u32(&mut file, 48, 1); // directory at sector 1
        put_u32(&mut file, 56, 4096); // mini stream cutoff
        put_u32(&mut file, 60, ENDOFCHAIN);
        put_u32(&mut file, 68, ENDOFCHAIN);
        put_u32(&mut file, 76, 0); // DIFAT[0] → FAT sector 0
        for i in 1..109 {
            put_u32(&mut file, 76 + i * 4, FREESECT);
        }

        // FAT (sector 0): chains 2..=9 and 10..=17, rest free.
        let fat = sector; // byte offset of sector 0
        put_u32(&mut file, fat, 0xFFFF_FFFD); // the FAT sector itself
        put_u32(&mut file, fat + 4, ENDOFCHAIN); // directory chain
        for s in 2..9 {
            put_u32(&mut file, fat + s * 4, s as u32 + 1);
        }
        put_u32(&mut file, fat + 9 * 4, ENDOFCHAIN);
        for s in 10..17 {
            put_u32(&mut file, fat + s * 4, s as u32 + 1);
        }
        put_u32(&mut file, fat + 17 * 4, ENDOFCHAIN);
        for s in 18..sector / 4 {
            put_u32(&mut file, fat + s * 4, FREESECT);
        }

        // Directory (sector 1)
        let dir = sector * 2;
        file[dir..dir + 128].copy_from_slice(&dir_entry("Root Entry", 5, ENDOFCHAIN, 0));
        file[dir + 128..dir + 256].copy_from_slice(&dir_entry("WordDocument", 2, 2, 4096));
        file[dir + 256..dir + 384].copy_from_slice(&dir_entry("0Table", 2, 10, 4096));

        // WordDocument stream (sectors 2..=9, file offset 1536)
        let word = sector * 3;
        put_u16(&mut file, word, WORD_MAGIC);
        put_u16(&mut file, word + 2, 0x00C1);
        put_u16(&mut file, word + 0x0A, 0); // 0Table, not encrypted
        put_u16(&mut file, word + 32, 14); // csw
        put_u16(&mut file, word + 62, 22); // cslw
        put_u16(&mut file, word + 152, 0x005D); // cbRgFcLcb
        let ascii_len = ascii_piece.len();
        let utf16_len = utf16_piece.chars().count();
        put_u32(&mut file, word + 418, 0); // fcClx
        put_u32(&mut file, word + 422, 5 + 12 + 2 * 8); // lcbClx
        // CP-1252 piece at stream offset 1024, UTF-16 piece at 2048.
        for (i, &b) in ascii_piece.as_bytes().iter().enumerate() {
            file[word + 1024 + i] = b;
        }
        for (i, unit) in utf16_piece.encode_utf16().enumerate() {
            put_u16(&mut file, word + 2048 + i * 2, unit);
        }

        // 0Table stream (sectors 10..=17, file offset 5632): Clx
        let table = sector * 11;
        file[table] = 0x02;
        put_u32(&mut file, table + 1, 12 + 2 * 8); // PlcPcd length
        let plc = table + 5;
        put_u32(&mut file, plc, 0);
        put_u32(&mut file, plc + 4, ascii_len as u32);
        put_u32(&mut file, plc + 8, (ascii_len + utf16_len) as u32);
        // PCD 0: compressed, fc = 2 * 1024
        put_u32(&mut file, plc + 12 + 2, 2048 | 0x4000_0000);
        // PCD 1: UTF-16 at byte offset 2048
        put_u32(&mut file, plc + 20 + 2, 2048);

        file
    }

    #[test]
    fn extracts_cp1252_and_utf16_pieces() {
        let bytes = minimal_doc(
            "Hoc phi cua truong la 500 nghin dong mot thang.\r",
            "Học phí đã gồm ăn trưa.\r",
        );
        let text = extract_doc(&bytes).unwrap();
        assert!(text.contains("500 nghin dong"));
        assert!(text.contains("Học phí đã gồm ăn trưa."));
        // Paragraph marks became newlines.
        assert_eq!(text.matches('\n').count(), 2);
    }

    #[test]
    fn rejects_non_cfb_input() {
        let err = extract_doc(b"definitely not a word file").unwrap_err();
        assert!(matches!(err, ExtractError::Legacy(_)));
    }

    #[test]
    fn rejects_truncated_container() {
        let bytes = minimal_doc("short.\r", "x\r");
        let err = extract_doc(&bytes[..1024]).unwrap_err();
        assert!(matches!(err, ExtractError::Legacy(_)));
    }

    #[test]
    fn cp1252_specials_map_to_unicode() {
        assert_eq!(cp1252_char(0x93), '“');
        assert_eq!(cp1252_char(0x96), '–');
        assert_eq!(cp1252_char(0x41), 'A');
        assert_eq!(cp1252_char(0xE9), 'é');
    }

    #[test]
    fn field_instructions_are_dropped() {
        let raw = "Xem \u{13}HYPERLINK foo\u{14}trang web\u{15} nhé.";
        assert_eq!(sanitize_word_text(raw), "Xem trang web nhé.");
    }
}
