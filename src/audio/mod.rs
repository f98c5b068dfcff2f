pub mod analysis;
pub mod decode;
pub mod features;
pub mod key;
pub mod music;
pub mod onset;
pub mod peaks;
pub mod policy;
pub mod spectral;
pub mod stats;
pub mod tempo;
pub mod tonality;
pub mod window;
