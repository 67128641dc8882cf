//! Operator (codec) pipeline for transformed blocks.
//!
//! A block written through one or more operators carries its transform chain
//! in metadata. Reading it back locates the active transform, sizes the
//! buffers, and hands the stored bytes to a decoder from the registry.
//!
//! Only the first known transform in a chain is decoded. Chains with more
//! than one real transform are not unwound further.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::util::{DataKind, Dims, Error, Result};

/// One link in a block's transform chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockOperationInfo {
    /// Operator tag, e.g. `"zlib"`.
    pub type_name: String,
    /// Element kind before the transform.
    pub pre_kind: DataKind,
    /// Block extent before the transform.
    pub pre_count: Dims,
    pub pre_shape: Dims,
    pub pre_start: Dims,
    /// Bytes per element before the transform.
    pub pre_size_of: usize,
    /// Declared byte size of the input the operator consumed.
    pub pre_size: u64,
    /// Subfile offset of the stored payload.
    pub payload_offset: u64,
    /// Stored (post-transform) payload size in bytes.
    pub payload_size: u64,
    /// Operator-specific parameters.
    pub metadata: Vec<u8>,
}

impl BlockOperationInfo {
    /// Byte size of the block once the transform is reversed.
    ///
    /// Fails if the extent overflows or exceeds the declared `pre_size`.
    pub fn pre_bytes(&self) -> Result<usize> {
        let bytes = self
            .pre_count
            .iter()
            .try_fold(self.pre_size_of, |acc, &n| acc.checked_mul(n))
            .ok_or_else(|| self.failed(format!("pre-transform extent {:?} overflows", self.pre_count)))?;
        if bytes as u64 > self.pre_size {
            return Err(self.failed(format!(
                "pre-transform extent is {bytes} bytes, declared size is {}",
                self.pre_size
            )));
        }
        Ok(bytes)
    }

    fn failed(&self, reason: String) -> Error {
        Error::CodecFailed { codec: self.type_name.clone(), reason }
    }

    #[inline]
    pub fn is_identity(&self) -> bool {
        self.type_name == IDENTITY_OPERATOR
    }
}

/// True if every operation in the chain is a pass-through, so stored bytes
/// can land directly in caller memory.
pub fn identity_operation(operations: &[BlockOperationInfo]) -> bool {
    operations.iter().all(BlockOperationInfo::is_identity)
}

/// A registered decoder for one operator type.
pub trait Operator: Send + Sync {
    /// Operator tag as it appears in metadata.
    fn name(&self) -> &'static str;

    /// Reverse the transform of `stored` into `out`, which is already sized
    /// to the block's pre-transform byte length.
    fn decode(&self, stored: &[u8], info: &BlockOperationInfo, out: &mut [u8]) -> Result<()>;
}

/// Tag of the pass-through operator.
pub const IDENTITY_OPERATOR: &str = "identity";

/// Tag of the zlib operator.
pub const ZLIB_OPERATOR: &str = "zlib";

/// Transform types known to the format but shipped without a decoder.
pub const DECLARED_TRANSFORMS: &[&str] = &["zfp", "sz", "mgard", "bzip2", "blosc", "png"];

/// Pass-through operator: stored bytes are the original bytes.
#[derive(Clone, Copy, Debug, Default)]
pub struct IdentityOperator;

impl Operator for IdentityOperator {
    fn name(&self) -> &'static str {
        IDENTITY_OPERATOR
    }

    fn decode(&self, stored: &[u8], _info: &BlockOperationInfo, out: &mut [u8]) -> Result<()> {
        if stored.len() != out.len() {
            return Err(Error::CodecFailed {
                codec: IDENTITY_OPERATOR.into(),
                reason: format!("stored {} bytes, block needs {}", stored.len(), out.len()),
            });
        }
        out.copy_from_slice(stored);
        Ok(())
    }
}

/// zlib inflate via flate2.
#[cfg(feature = "zlib")]
#[derive(Clone, Copy, Debug, Default)]
pub struct ZlibOperator;

#[cfg(feature = "zlib")]
impl Operator for ZlibOperator {
    fn name(&self) -> &'static str {
        ZLIB_OPERATOR
    }

    fn decode(&self, stored: &[u8], _info: &BlockOperationInfo, out: &mut [u8]) -> Result<()> {
        use flate2::read::ZlibDecoder;
        use std::io::Read;

        let mut decoder = ZlibDecoder::new(stored);
        decoder.read_exact(out).map_err(|e| Error::CodecFailed {
            codec: ZLIB_OPERATOR.into(),
            reason: e.to_string(),
        })?;

        // Anything left over means the block metadata lied about its size
        let mut probe = [0u8; 1];
        match decoder.read(&mut probe) {
            Ok(0) => Ok(()),
            Ok(_) => Err(Error::CodecFailed {
                codec: ZLIB_OPERATOR.into(),
                reason: format!("stream inflates past {} bytes", out.len()),
            }),
            Err(e) => Err(Error::CodecFailed { codec: ZLIB_OPERATOR.into(), reason: e.to_string() }),
        }
    }
}

/// Registry of transform types and their decoders.
#[derive(Clone)]
pub struct OperatorRegistry {
    transform_types: HashSet<String>,
    decoders: HashMap<String, Arc<dyn Operator>>,
}

impl OperatorRegistry {
    /// Registry with no known transforms.
    pub fn empty() -> Self {
        Self { transform_types: HashSet::new(), decoders: HashMap::new() }
    }

    /// Register a decoder, marking its type as known.
    pub fn register(&mut self, operator: Arc<dyn Operator>) -> &mut Self {
        let name = operator.name().to_string();
        self.transform_types.insert(name.clone());
        self.decoders.insert(name, operator);
        self
    }

    /// Mark a transform type as known without supplying a decoder.
    pub fn declare_transform(&mut self, type_name: impl Into<String>) -> &mut Self {
        self.transform_types.insert(type_name.into());
        self
    }

    #[inline]
    pub fn is_known(&self, type_name: &str) -> bool {
        self.transform_types.contains(type_name)
    }

    /// Decoder for a transform type, if one is registered.
    pub fn get(&self, type_name: &str) -> Option<Arc<dyn Operator>> {
        self.decoders.get(type_name).cloned()
    }

    /// First operation in the chain whose type is known. Unknown tags are
    /// passed over.
    pub fn locate<'a>(&self, operations: &'a [BlockOperationInfo]) -> Option<&'a BlockOperationInfo> {
        operations.iter().find(|op| self.is_known(&op.type_name))
    }

    /// Locate the active transform and, unless `identity` is set, size
    /// `post_op_data` to hold its stored payload.
    pub fn init_post_operator_block_data<'a>(
        &self,
        operations: &'a [BlockOperationInfo],
        post_op_data: &mut Vec<u8>,
        identity: bool,
    ) -> Result<&'a BlockOperationInfo> {
        let info = self.locate(operations).ok_or_else(|| {
            let tags: Vec<&str> = operations.iter().map(|op| op.type_name.as_str()).collect();
            Error::UnknownCodec(format!("no known transform in chain [{}]", tags.join(", ")))
        })?;

        if !identity {
            let size = usize::try_from(info.payload_size)
                .map_err(|_| Error::format(format!("payload size {} exceeds usize", info.payload_size)))?;
            post_op_data.resize(size, 0);
        }
        Ok(info)
    }

    /// Decode `post_op_data` into `pre_op_data`, sized to the pre-transform
    /// block.
    pub fn get_pre_operator_block_data(
        &self,
        post_op_data: &[u8],
        info: &BlockOperationInfo,
        pre_op_data: &mut Vec<u8>,
    ) -> Result<()> {
        let decoder = self
            .get(&info.type_name)
            .ok_or_else(|| Error::UnknownCodec(info.type_name.clone()))?;

        let size = info.pre_bytes()?;
        pre_op_data.clear();
        pre_op_data.resize(size, 0);
        decoder.decode(post_op_data, info, pre_op_data)?;
        tracing::trace!(
            codec = %info.type_name,
            stored = post_op_data.len(),
            decoded = pre_op_data.len(),
            "decoded block"
        );
        Ok(())
    }

    /// Recover the pre-transform bytes of one stored block.
    pub fn decode_block(&self, operations: &[BlockOperationInfo], stored: &[u8]) -> Result<Vec<u8>> {
        let mut post = stored.to_vec();
        let info = self.init_post_operator_block_data(operations, &mut post, true)?;
        let mut pre = Vec::new();
        self.get_pre_operator_block_data(&post, info, &mut pre)?;
        Ok(pre)
    }
}

impl Default for OperatorRegistry {
    /// Built-in decoders plus the transform types the format declares.
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(IdentityOperator));
        #[cfg(feature = "zlib")]
        registry.register(Arc::new(ZlibOperator));
        for name in DECLARED_TRANSFORMS {
            registry.declare_transform(*name);
        }
        registry
    }
}

impl std::fmt::Debug for OperatorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut known: Vec<_> = self.transform_types.iter().collect();
        known.sort();
        let mut decoders: Vec<_> = self.decoders.keys().collect();
        decoders.sort();
        f.debug_struct("OperatorRegistry")
            .field("known", &known)
            .field("decoders", &decoders)
            .finish()
    }
}
