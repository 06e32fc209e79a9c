//! Closed per-language stopword sets.
//!
//! High-frequency function words are skipped before lookup to keep the
//! cache (and the LLM bill) small. Sets are keyed by both the full language
//! name and its ISO 639-1 code; lookups are case-insensitive.

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;

const ENGLISH: &[&str] = &[
    // articles & determiners
    "the", "a", "an", "this", "that", "these", "those",
    // be-verbs & auxiliaries
    "is", "are", "was", "were", "be", "been", "being", "am", "have", "has", "had", "do",
    "does", "did", "will", "would", "shall", "should", "may", "might", "can", "could", "must",
    // prepositions
    "to", "of", "in", "for", "on", "with", "at", "by", "from", "into", "about", "over",
    "under", "between", "through", "after", "before", "up", "out", "off",
    // conjunctions & negation
    "and", "or", "but", "not", "no", "nor", "if", "then", "than", "so", "as", "because",
    // pronouns
    "i", "you", "he", "she", "it", "we", "they", "me", "him", "her", "us", "them", "my",
    "your", "his", "our", "their", "its", "mine", "yours", "ours", "theirs",
    // interrogatives
    "who", "whom", "whose", "what", "which", "when", "where", "how", "why",
    // adverbs & quantifiers
    "very", "also", "just", "too", "there", "here", "now", "all", "any", "some", "each",
    "every", "such", "only", "own", "same",
];

const SPANISH: &[&str] = &[
    "el", "la", "los", "las", "un", "una", "unos", "unas", "lo", "al", "del", "de", "en",
    "por", "para", "con", "sin", "sobre", "entre", "hasta", "desde", "y", "e", "o", "u",
    "pero", "sino", "que", "si", "no", "como", "cuando", "donde", "yo", "tú", "él", "ella",
    "nosotros", "vosotros", "ellos", "ellas", "me", "te", "se", "nos", "os", "le", "les",
    "mi", "tu", "su", "sus", "mis", "tus", "es", "son", "está", "están", "ser", "estar",
    "ha", "han", "hay", "muy", "más", "este", "esta", "ese", "esa", "esto", "eso",
];

const FRENCH: &[&str] = &[
    "le", "la", "les", "un", "une", "des", "du", "de", "au", "aux", "et", "ou", "mais",
    "donc", "car", "ni", "que", "qui", "quoi", "dont", "où", "en", "dans", "par", "pour",
    "sur", "avec", "sans", "sous", "je", "tu", "il", "elle", "nous", "vous", "ils", "elles",
    "me", "te", "se", "lui", "leur", "mon", "ton", "son", "ma", "ta", "sa", "mes", "tes",
    "ses", "ce", "cet", "cette", "ces", "est", "sont", "être", "avoir", "a", "ont", "ne",
    "pas", "plus", "très",
];

const GERMAN: &[&str] = &[
    "der", "die", "das", "den", "dem", "des", "ein", "eine", "einen", "einem", "einer",
    "eines", "und", "oder", "aber", "doch", "denn", "dass", "wenn", "als", "wie", "in", "im",
    "an", "am", "auf", "aus", "bei", "mit", "nach", "von", "vom", "zu", "zum", "zur", "für",
    "über", "unter", "ich", "du", "er", "sie", "es", "wir", "ihr", "mich", "dich", "sich",
    "mein", "dein", "sein", "ist", "sind", "war", "waren", "hat", "haben", "nicht", "kein",
    "keine", "sehr", "auch", "noch", "schon",
];

const ITALIAN: &[&str] = &[
    "il", "lo", "la", "i", "gli", "le", "un", "uno", "una", "di", "a", "da", "in", "con",
    "su", "per", "tra", "fra", "del", "della", "dei", "delle", "al", "alla", "nel", "nella",
    "e", "o", "ma", "che", "se", "non", "come", "io", "tu", "lui", "lei", "noi", "voi",
    "loro", "mi", "ti", "si", "ci", "vi", "mio", "tuo", "suo", "è", "sono", "essere",
    "avere", "ha", "hanno", "molto", "più",
];

const PORTUGUESE: &[&str] = &[
    "o", "a", "os", "as", "um", "uma", "uns", "umas", "de", "do", "da", "dos", "das", "em",
    "no", "na", "nos", "nas", "por", "para", "com", "sem", "sobre", "e", "ou", "mas", "que",
    "se", "não", "como", "eu", "tu", "ele", "ela", "nós", "vós", "eles", "elas", "me", "te",
    "lhe", "meu", "minha", "seu", "sua", "é", "são", "ser", "estar", "está", "tem", "muito",
    "mais",
];

const RUSSIAN: &[&str] = &[
    "и", "в", "во", "не", "что", "он", "на", "я", "с", "со", "как", "а", "то", "все", "она",
    "так", "его", "но", "да", "ты", "к", "у", "же", "вы", "за", "бы", "по", "только", "ее",
    "мне", "было", "вот", "от", "меня", "еще", "нет", "о", "из", "ему", "мы", "они", "это",
    "был", "была", "для", "или",
];

const TURKISH: &[&str] = &[
    "ve", "veya", "ama", "fakat", "bir", "bu", "şu", "o", "da", "de", "ki", "mi", "mı",
    "mu", "mü", "ile", "için", "gibi", "kadar", "ben", "sen", "biz", "siz", "onlar", "ne",
    "çok", "daha", "en", "her",
];

const ARABIC: &[&str] = &[
    "في", "من", "إلى", "الى", "على", "عن", "مع", "و", "أو", "او", "ثم", "لكن", "بل", "أن",
    "ان", "إن", "لا", "لم", "لن", "ما", "هذا", "هذه", "ذلك", "تلك", "هو", "هي", "هم", "هن",
    "أنا", "انا", "أنت", "انت", "نحن", "الذي", "التي", "الذين", "كان", "كانت", "قد", "كل",
    "بعض", "عند", "حتى", "إذا", "اذا", "يا", "ب", "ل", "ك",
];

const PERSIAN: &[&str] = &[
    "و", "در", "به", "از", "که", "را", "با", "این", "آن", "برای", "تا", "یا", "هم", "است",
    "بود", "شد", "من", "تو", "او", "ما", "شما", "آنها", "اما", "نه",
];

const HINDI: &[&str] = &[
    "और", "का", "की", "के", "को", "में", "से", "पर", "है", "हैं", "था", "थी", "थे", "यह",
    "वह", "ये", "वे", "मैं", "तुम", "आप", "हम", "ने", "भी", "तो", "ही", "या", "कि", "जो",
    "एक", "नहीं", "लिए",
];

const CHINESE: &[&str] = &[
    "的", "了", "是", "在", "和", "也", "就", "都", "而", "及", "与", "着", "或", "之", "吗",
    "呢", "吧", "啊",
];

const JAPANESE: &[&str] = &[
    "の", "は", "が", "を", "に", "で", "と", "も", "へ", "や", "か", "ね", "よ", "な", "た",
    "だ", "て",
];

const KOREAN: &[&str] = &["은", "는", "이", "가", "을", "를", "에", "의", "와", "과", "도", "로"];

static STOPWORDS: Lazy<HashMap<&'static str, HashSet<&'static str>>> = Lazy::new(|| {
    let tables: &[(&[&str], &[&str])] = &[
        (&["english", "en"], ENGLISH),
        (&["spanish", "es"], SPANISH),
        (&["french", "fr"], FRENCH),
        (&["german", "de"], GERMAN),
        (&["italian", "it"], ITALIAN),
        (&["portuguese", "pt"], PORTUGUESE),
        (&["russian", "ru"], RUSSIAN),
        (&["turkish", "tr"], TURKISH),
        (&["arabic", "ar"], ARABIC),
        (&["persian", "farsi", "fa"], PERSIAN),
        (&["hindi", "hi"], HINDI),
        (&["chinese", "mandarin", "zh"], CHINESE),
        (&["japanese", "ja"], JAPANESE),
        (&["korean", "ko"], KOREAN),
    ];

    let mut map = HashMap::new();
    for (keys, words) in tables {
        let set: HashSet<&'static str> = words.iter().copied().collect();
        for key in keys.iter() {
            map.insert(*key, set.clone());
        }
    }
    map
});

/// Stopword set for a language name or code, if one is defined.
pub fn for_language(language: &str) -> Option<&'static HashSet<&'static str>> {
    STOPWORDS.get(language.trim().to_lowercase().as_str())
}
