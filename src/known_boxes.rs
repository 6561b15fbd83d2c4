use crate::boxes::FourCC;

macro_rules! known_boxes {
    ($($variant:ident = $cc:literal, $name:literal, $container:literal;)*) => {
        /// Box types that have no structured codec but are still recognized:
        /// either parsed as plain containers or passed through as leaves.
        ///
        /// Anything not in this list becomes `KnownBox::Unknown(fourcc)`.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum KnownBox {
            $($variant,)*
            Unknown(FourCC),
        }

        impl From<FourCC> for KnownBox {
            fn from(cc: FourCC) -> Self {
                match &cc.0 {
                    $($cc => KnownBox::$variant,)*
                    _ => KnownBox::Unknown(cc),
                }
            }
        }

        impl KnownBox {
            /// Is the body of this box nothing but child boxes?
            pub fn is_container(&self) -> bool {
                match self {
                    $(KnownBox::$variant => $container,)*
                    KnownBox::Unknown(_) => false,
                }
            }

            pub fn full_name(&self) -> &'static str {
                match self {
                    $(KnownBox::$variant => $name,)*
                    KnownBox::Unknown(_) => "Unknown Box",
                }
            }
        }
    };
}

known_boxes! {
    // always parsed as containers
    Udta = b"udta", "User Data Box", true;
    Mfra = b"mfra", "Movie Fragment Random Access Box", true;
    Sinf = b"sinf", "Protection Scheme Information Box", true;
    Schi = b"schi", "Scheme Information Box", true;
    Tref = b"tref", "Track Reference Box", true;
    Meco = b"meco", "Additional Metadata Container Box", true;
    Iprp = b"iprp", "Item Properties Box", true;
    Ipco = b"ipco", "Item Property Container Box", true;
    Rinf = b"rinf", "Restricted Scheme Information Box", true;
    Gmhd = b"gmhd", "Generic Media Header Box", true;
    Tapt = b"tapt", "Track Aperture Mode Dimensions Box", true;

    // opaque payloads
    Mdat = b"mdat", "Media Data Box", false;
    Free = b"free", "Free Space Box", false;
    Skip = b"skip", "Free Space Box", false;
    Wide = b"wide", "Wide Box", false;
    Meta = b"meta", "Meta Box", false;
    Pssh = b"pssh", "Protection System Specific Header Box", false;
    Tenc = b"tenc", "Track Encryption Box", false;
    Senc = b"senc", "Sample Encryption Box", false;
    Saiz = b"saiz", "Sample Auxiliary Information Sizes Box", false;
    Saio = b"saio", "Sample Auxiliary Information Offsets Box", false;
    Frma = b"frma", "Original Format Box", false;
    Schm = b"schm", "Scheme Type Box", false;
    Esds = b"esds", "Elementary Stream Descriptor Box", false;
    Emsg = b"emsg", "Event Message Box", false;
    Prft = b"prft", "Producer Reference Time Box", false;
    Mfro = b"mfro", "Movie Fragment Random Access Offset Box", false;
    Tfra = b"tfra", "Track Fragment Random Access Box", false;
    Sdtp = b"sdtp", "Independent and Disposable Samples Box", false;
    Sgpd = b"sgpd", "Sample Group Description Box", false;
    Nmhd = b"nmhd", "Null Media Header Box", false;
    Hmhd = b"hmhd", "Hint Media Header Box", false;
    Colr = b"colr", "Colour Information Box", false;
}
