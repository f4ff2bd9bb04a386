//! The composed-name grammar for ion species.
//!
//! Atom-probe naming follows chemical-formula conventions: a name is a
//! sequence of fragments, each an uppercase letter plus optional lowercase
//! letters, optionally followed by an integer multiplicity. `Cu2Au` reads
//! as two copper plus one gold. Digits may not lead a name and everything
//! must be ASCII.

/// One decomposed fragment: element-ish token plus multiplicity.
pub type NameFragment = (String, usize);

/// Break a composed name into fragments. Returns `None` when the name
/// does not obey the grammar. An empty name decomposes to no fragments.
pub fn decompose_ion_names(name: &str) -> Option<Vec<NameFragment>> {
    if name.is_empty() {
        return Some(Vec::new());
    }
    let bytes = name.as_bytes();
    if !name.is_ascii() || bytes[0].is_ascii_digit() || bytes[0].is_ascii_lowercase() {
        return None;
    }

    let mut fragments = Vec::new();
    let mut frag_start = 0usize;
    let mut digit_start = 0usize;
    let mut in_name = true;

    for (i, &b) in bytes.iter().enumerate().skip(1) {
        if !b.is_ascii() {
            return None;
        }
        if in_name {
            if b.is_ascii_digit() {
                digit_start = i;
                in_name = false;
            } else if b.is_ascii_uppercase() {
                // New fragment with no explicit multiplicity.
                fragments.push((name[frag_start..i].to_string(), 1));
                frag_start = i;
            }
        } else if b.is_ascii_alphabetic() {
            let mult: usize = name[digit_start..i].parse().ok()?;
            fragments.push((name[frag_start..digit_start].to_string(), mult));
            frag_start = i;
            in_name = true;
        }
    }

    if in_name {
        fragments.push((name[frag_start..].to_string(), 1));
    } else {
        let mult: usize = name[digit_start..].parse().ok()?;
        fragments.push((name[frag_start..digit_start].to_string(), mult));
    }
    Some(fragments)
}

/// Find the unique candidate name whose decomposition matches the fragment
/// multiset `wanted`. `candidates` pairs each composable name with its
/// caller-side payload (typically an ion index). Names that fail to
/// decompose simply never match. Returns `None` unless exactly one
/// candidate survives.
pub fn match_composed_name<T: Copy>(
    candidates: &[(String, T)],
    wanted: &[NameFragment],
) -> Option<T> {
    let decomposed: Vec<Option<Vec<NameFragment>>> = candidates
        .iter()
        .map(|(name, _)| decompose_ion_names(name))
        .collect();

    let mut matched = None;
    for (i, frags) in decomposed.iter().enumerate() {
        let Some(frags) = frags else { continue };
        if frags.is_empty() {
            continue;
        }
        // Bijection: every wanted fragment appears in the candidate, and
        // the candidate holds nothing beyond the wanted set.
        let covers = wanted.iter().all(|w| frags.contains(w));
        let exact = frags.iter().all(|f| wanted.contains(f));
        if covers && exact {
            if matched.is_some() {
                // Ambiguous: more than one candidate fits.
                return None;
            }
            matched = Some(candidates[i].1);
        }
    }
    matched
}

/// Element naming in atomic-number order, long name then symbol.
pub const ELEMENT_NAMES: &[(&str, &str)] = &[
    ("Hydrogen", "H"),
    ("Helium", "He"),
    ("Lithium", "Li"),
    ("Beryllium", "Be"),
    ("Boron", "B"),
    ("Carbon", "C"),
    ("Nitrogen", "N"),
    ("Oxygen", "O"),
    ("Fluorine", "F"),
    ("Neon", "Ne"),
    ("Sodium", "Na"),
    ("Magnesium", "Mg"),
    ("Aluminium", "Al"),
    ("Silicon", "Si"),
    ("Phosphorus", "P"),
    ("Sulfur", "S"),
    ("Chlorine", "Cl"),
    ("Argon", "Ar"),
    ("Potassium", "K"),
    ("Calcium", "Ca"),
    ("Scandium", "Sc"),
    ("Titanium", "Ti"),
    ("Vanadium", "V"),
    ("Chromium", "Cr"),
    ("Manganese", "Mn"),
    ("Iron", "Fe"),
    ("Cobalt", "Co"),
    ("Nickel", "Ni"),
    ("Copper", "Cu"),
    ("Zinc", "Zn"),
    ("Gallium", "Ga"),
    ("Germanium", "Ge"),
    ("Arsenic", "As"),
    ("Selenium", "Se"),
    ("Bromine", "Br"),
    ("Krypton", "Kr"),
    ("Rubidium", "Rb"),
    ("Strontium", "Sr"),
    ("Yttrium", "Y"),
    ("Zirconium", "Zr"),
    ("Niobium", "Nb"),
    ("Molybdenum", "Mo"),
    ("Technetium", "Tc"),
    ("Ruthenium", "Ru"),
    ("Rhodium", "Rh"),
    ("Palladium", "Pd"),
    ("Silver", "Ag"),
    ("Cadmium", "Cd"),
    ("Indium", "In"),
    ("Tin", "Sn"),
    ("Antimony", "Sb"),
    ("Tellurium", "Te"),
    ("Iodine", "I"),
    ("Xenon", "Xe"),
    ("Caesium", "Cs"),
    ("Barium", "Ba"),
    ("Lanthanum", "La"),
    ("Cerium", "Ce"),
    ("Praseodymium", "Pr"),
    ("Neodymium", "Nd"),
    ("Promethium", "Pm"),
    ("Samarium", "Sm"),
    ("Europium", "Eu"),
    ("Gadolinium", "Gd"),
    ("Terbium", "Tb"),
    ("Dysprosium", "Dy"),
    ("Holmium", "Ho"),
    ("Erbium", "Er"),
    ("Thulium", "Tm"),
    ("Ytterbium", "Yb"),
    ("Lutetium", "Lu"),
    ("Hafnium", "Hf"),
    ("Tantalum", "Ta"),
    ("Tungsten", "W"),
    ("Rhenium", "Re"),
    ("Osmium", "Os"),
    ("Iridium", "Ir"),
    ("Platinum", "Pt"),
    ("Gold", "Au"),
    ("Mercury", "Hg"),
    ("Thallium", "Tl"),
    ("Lead", "Pb"),
    ("Bismuth", "Bi"),
    ("Polonium", "Po"),
    ("Astatine", "At"),
    ("Radon", "Rn"),
    ("Francium", "Fr"),
    ("Radium", "Ra"),
    ("Actinium", "Ac"),
    ("Thorium", "Th"),
    ("Protactinium", "Pa"),
    ("Uranium", "U"),
    ("Neptunium", "Np"),
    ("Plutonium", "Pu"),
    ("Americium", "Am"),
    ("Curium", "Cm"),
    ("Berkelium", "Bk"),
    ("Californium", "Cf"),
    ("Einsteinium", "Es"),
    ("Fermium", "Fm"),
    ("Mendelevium", "Md"),
    ("Nobelium", "No"),
    ("Lawrencium", "Lr"),
    ("Rutherfordium", "Rf"),
    ("Dubnium", "Db"),
    ("Seaborgium", "Sg"),
    ("Bohrium", "Bh"),
    ("Hassium", "Hs"),
    ("Meitnerium", "Mt"),
    ("Darmstadtium", "Ds"),
    ("Roentgenium", "Rg"),
];

/// Atomic number for an exact long-name or symbol match; 0 when unknown.
pub fn atomic_number(name: &str) -> u32 {
    for (i, (long, symbol)) in ELEMENT_NAMES.iter().enumerate() {
        if name == *long || name == *symbol {
            return i as u32 + 1;
        }
    }
    0
}
