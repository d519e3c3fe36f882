//! Monoisotopic residue masses and tryptic sequence helpers.

pub const PROTON: f64 = 1.007_276_466_812;
pub const WATER: f64 = 18.010_564_684;

pub fn residue_mass(aa: char) -> Option<f64> {
    let mass = match aa {
        'G' => 57.021_464,
        'A' => 71.037_114,
        'S' => 87.032_028,
        'P' => 97.052_764,
        'V' => 99.068_414,
        'T' => 101.047_679,
        'C' => 103.009_185,
        'L' | 'I' => 113.084_064,
        'N' => 114.042_927,
        'D' => 115.026_943,
        'Q' => 128.058_578,
        'K' => 128.094_963,
        'E' => 129.042_593,
        'M' => 131.040_485,
        'H' => 137.058_912,
        'F' => 147.068_414,
        'U' => 150.953_636,
        'R' => 156.101_111,
        'Y' => 163.063_329,
        'W' => 186.079_313,
        'O' => 237.147_727,
        _ => return None,
    };
    Some(mass)
}

/// Drops modification annotations such as `M(Oxidation)` or `C[+57.02]`,
/// leaving only residue letters.
pub fn unmodified(sequence: &str) -> String {
    let mut depth = 0usize;
    let mut out = String::with_capacity(sequence.len());
    for c in sequence.chars() {
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            c if depth == 0 && c.is_ascii_uppercase() => out.push(c),
            _ => {}
        }
    }
    out
}

fn residue_masses(sequence: &str) -> Option<Vec<f64>> {
    unmodified(sequence).chars().map(residue_mass).collect()
}

/// Neutral monoisotopic mass; `None` for unknown residues or empty sequences.
pub fn monoisotopic_mass(sequence: &str) -> Option<f64> {
    let masses = residue_masses(sequence)?;
    if masses.is_empty() {
        return None;
    }
    Some(masses.iter().sum::<f64>() + WATER)
}

pub fn mz(sequence: &str, charge: i32) -> Option<f64> {
    if charge <= 0 {
        return None;
    }
    let z = charge as f64;
    monoisotopic_mass(sequence).map(|m| (m + z * PROTON) / z)
}

/// Singly charged b- and y-ion m/z values.
pub fn fragment_ions(sequence: &str) -> Vec<f64> {
    let masses = match residue_masses(sequence) {
        Some(m) if m.len() > 1 => m,
        _ => return Vec::new(),
    };
    let total: f64 = masses.iter().sum();
    let mut ions = Vec::with_capacity(2 * (masses.len() - 1));
    let mut prefix = 0.0;
    for mass in &masses[..masses.len() - 1] {
        prefix += mass;
        ions.push(prefix + PROTON);
        ions.push(total - prefix + WATER + PROTON);
    }
    ions.sort_by(|a, b| a.total_cmp(b));
    ions
}

fn is_cleavage_site(residues: &[char], i: usize) -> bool {
    matches!(residues[i], 'K' | 'R') && residues.get(i + 1).map_or(true, |n| *n != 'P')
}

/// Internal tryptic sites (K/R not followed by P), excluding the C-terminal residue.
pub fn missed_cleavages(sequence: &str) -> usize {
    let residues: Vec<char> = unmodified(sequence).chars().collect();
    if residues.len() < 2 {
        return 0;
    }
    (0..residues.len() - 1)
        .filter(|&i| is_cleavage_site(&residues, i))
        .count()
}

/// Tryptic digest of `protein` allowing up to `max_missed` missed cleavages.
pub fn tryptic_peptides(protein: &str, max_missed: usize) -> Vec<String> {
    let residues: Vec<char> = protein.chars().collect();
    let mut fragments: Vec<String> = Vec::new();
    let mut start = 0;
    for i in 0..residues.len() {
        if is_cleavage_site(&residues, i) || i + 1 == residues.len() {
            fragments.push(residues[start..=i].iter().collect());
            start = i + 1;
        }
    }
    let mut peptides = Vec::new();
    for first in 0..fragments.len() {
        let mut joined = String::new();
        for fragment in fragments.iter().skip(first).take(max_missed + 1) {
            joined.push_str(fragment);
            peptides.push(joined.clone());
        }
    }
    peptides
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_modifications() {
        assert_eq!(unmodified("PEPM(Oxidation)TIDEK"), "PEPMTIDEK");
        assert_eq!(unmodified(".C[+57.02]AK."), "CAK");
    }

    #[test]
    fn peptide_mass_and_mz() {
        // GG: 2 * 57.021464 + water
        let mass = monoisotopic_mass("GG").expect("mass");
        assert!((mass - 132.053_492_684).abs() < 1e-6);
        let mz2 = mz("GG", 2).expect("mz");
        assert!((mz2 - (mass + 2.0 * PROTON) / 2.0).abs() < 1e-9);
        assert!(mz("GG", 0).is_none());
        assert!(monoisotopic_mass("GXG").is_none());
    }

    #[test]
    fn fragment_ions_cover_b_and_y_series() {
        let ions = fragment_ions("GAK");
        assert_eq!(ions.len(), 4);
        let b1 = 57.021_464 + PROTON;
        assert!(ions.iter().any(|i| (i - b1).abs() < 1e-9));
        let y1 = 128.094_963 + WATER + PROTON;
        assert!(ions.iter().any(|i| (i - y1).abs() < 1e-9));
        assert!(fragment_ions("K").is_empty());
    }

    #[test]
    fn counts_missed_cleavages() {
        assert_eq!(missed_cleavages("PEPTIDEK"), 0);
        assert_eq!(missed_cleavages("PEKTIDER"), 1);
        assert_eq!(missed_cleavages("PEKPTIDER"), 0);
        assert_eq!(missed_cleavages("AKRK"), 2);
        assert_eq!(missed_cleavages(""), 0);
    }

    #[test]
    fn digest_respects_missed_cleavage_limit() {
        let peptides = tryptic_peptides("AAKBBRPCCKDD", 1);
        assert!(peptides.contains(&"AAK".to_string()));
        assert!(peptides.contains(&"BBRPCCK".to_string()));
        assert!(peptides.contains(&"AAKBBRPCCK".to_string()));
        assert!(peptides.contains(&"DD".to_string()));
        assert!(!peptides.contains(&"AAKBBRPCCKDD".to_string()));
    }
}
