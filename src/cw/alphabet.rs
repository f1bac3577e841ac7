/// Morse code lookup table
pub const MORSE_TABLE: &[(char, &str)] = &[
    ('A', ".-"),
    ('B', "-..."),
    ('C', "-.-."),
    ('D', "-.."),
    ('E', "."),
    ('F', "..-."),
    ('G', "--."),
    ('H', "...."),
    ('I', ".."),
    ('J', ".---"),
    ('K', "-.-"),
    ('L', ".-.."),
    ('M', "--"),
    ('N', "-."),
    ('O', "---"),
    ('P', ".--."),
    ('Q', "--.-"),
    ('R', ".-."),
    ('S', "..."),
    ('T', "-"),
    ('U', "..-"),
    ('V', "...-"),
    ('W', ".--"),
    ('X', "-..-"),
    ('Y', "-.--"),
    ('Z', "--.."),
    ('1', ".----"),
    ('2', "..---"),
    ('3', "...--"),
    ('4', "....-"),
    ('5', "....."),
    ('6', "-...."),
    ('7', "--..."),
    ('8', "---.."),
    ('9', "----."),
    ('0', "-----"),
    ('.', ".-.-.-"),
    (',', "--..--"),
    ('?', "..--.."),
    ('/', "-..-."),
    ('=', "-...-"),
    ('+', ".-.-."),
    ('-', "-....-"),
    ('@', ".--.-."),
];

/// Koch lesson order. Level `n` unlocks the first `n` characters.
pub const CURRICULUM: [char; 40] = [
    'K', 'M', 'R', 'S', 'U', 'A', 'P', 'T', 'L', 'O', 'W', 'I', '.', 'N', 'J', 'E', 'F', '0', 'Y',
    ',', 'V', 'G', '5', '/', 'Q', '9', 'Z', 'H', '3', '8', 'B', '?', '4', '2', '7', 'C', '1', 'D',
    '6', 'X',
];

/// Lowest lesson level; two characters are needed to form any drill
pub const MIN_LEVEL: u8 = 2;
/// Highest lesson level, every curriculum character unlocked
pub const MAX_LEVEL: u8 = CURRICULUM.len() as u8;

/// Look up the dit/dah pattern for a character (case-insensitive)
pub fn pattern_for(ch: char) -> Option<&'static str> {
    let ch = ch.to_ascii_uppercase();
    MORSE_TABLE
        .iter()
        .find(|(c, _)| *c == ch)
        .map(|(_, p)| *p)
}

/// True if the character can be keyed
pub fn is_encodable(ch: char) -> bool {
    pattern_for(ch).is_some()
}

/// Curriculum prefix unlocked at `level`, clamped to the valid level range
pub fn unlocked_at(level: u8) -> &'static [char] {
    let level = level.clamp(MIN_LEVEL, MAX_LEVEL) as usize;
    &CURRICULUM[..level]
}

pub fn clamp_level(level: i32) -> u8 {
    level.clamp(MIN_LEVEL as i32, MAX_LEVEL as i32) as u8
}
