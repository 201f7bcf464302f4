use anyhow::Result;
use std::path::PathBuf;

use chainlog::crypto::b64_encode;
use chainlog::keystore::create_signing_keystore;

use crate::util::sealer;

pub fn exec(signing: PathBuf) -> Result<()> {
    let sealer = sealer()?;
    let keys = create_signing_keystore(&signing, sealer.as_ref())?;
    println!("signing keyring created: {}", signing.display());
    println!("public key (base64): {}", b64_encode(&keys.public_bytes()));
    Ok(())
}
