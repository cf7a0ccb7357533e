//! Local embeddings with a sentence-transformer ONNX model.

use std::path::Path;
use std::sync::{Arc, Mutex};

use ort::session::Session;
use ort::value::TensorRef;
use tokenizers::Tokenizer;
use tracing::info;

use decode_core::error::ServiceError;

use crate::embedding::{normalize, EmbeddingService};

/// Position embeddings of BERT-style models stop at 512 tokens.
const MAX_SEQUENCE_LEN: usize = 512;
const MAX_BATCH_SIZE: usize = 32;

/// ONNX Runtime-backed embedding service.
///
/// Expects a model directory containing `model.onnx` and `tokenizer.json`.
/// The model takes `input_ids`, `attention_mask` and `token_type_ids` and
/// yields token embeddings, which are mean-pooled under the attention mask
/// and L2-normalized. Texts in a batch are padded to the longest one.
#[derive(Clone)]
pub struct OnnxEmbedding {
    session: Arc<Mutex<Session>>,
    tokenizer: Arc<Tokenizer>,
    dimensions: usize,
}

impl std::fmt::Debug for OnnxEmbedding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxEmbedding")
            .field("dimensions", &self.dimensions)
            .finish()
    }
}

struct EncodedBatch {
    input_ids: Vec<i64>,
    attention_mask: Vec<i64>,
    token_type_ids: Vec<i64>,
    batch: usize,
    seq_len: usize,
}

impl OnnxEmbedding {
    pub fn from_directory(model_dir: &Path) -> Result<Self, ServiceError> {
        Self::from_files(
            &model_dir.join("model.onnx"),
            &model_dir.join("tokenizer.json"),
        )
    }

    /// Load the model and tokenizer, then probe the model once to learn the
    /// embedding width.
    pub fn from_files(model_path: &Path, tokenizer_path: &Path) -> Result<Self, ServiceError> {
        if !model_path.exists() {
            return Err(ServiceError::Config(format!(
                "ONNX model not found at {}",
                model_path.display()
            )));
        }
        if !tokenizer_path.exists() {
            return Err(ServiceError::Config(format!(
                "Tokenizer not found at {}",
                tokenizer_path.display()
            )));
        }

        let session = Session::builder()
            .map_err(|e| ServiceError::Backend(format!("ONNX session builder: {}", e)))?
            .with_intra_threads(1)
            .map_err(|e| ServiceError::Backend(format!("ONNX set threads: {}", e)))?
            .commit_from_file(model_path)
            .map_err(|e| ServiceError::Backend(format!("ONNX load model: {}", e)))?;

        let tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| ServiceError::Backend(format!("Failed to load tokenizer: {}", e)))?;

        let mut service = Self {
            session: Arc::new(Mutex::new(session)),
            tokenizer: Arc::new(tokenizer),
            dimensions: 0,
        };
        let probe = service.embed_sync(&["dimension probe".to_string()])?;
        service.dimensions = probe.first().map(Vec::len).unwrap_or(0);
        if service.dimensions == 0 {
            return Err(ServiceError::Backend(
                "model produced an empty embedding".to_string(),
            ));
        }

        info!(
            model = %model_path.display(),
            dimensions = service.dimensions,
            "Loaded ONNX embedding model"
        );
        Ok(service)
    }

    fn encode(&self, texts: &[String]) -> Result<EncodedBatch, ServiceError> {
        let mut encodings = Vec::with_capacity(texts.len());
        for text in texts {
            if text.is_empty() {
                return Err(ServiceError::InvalidResponse(
                    "Cannot embed empty text".to_string(),
                ));
            }
            let encoding = self
                .tokenizer
                .encode(text.as_str(), true)
                .map_err(|e| ServiceError::Backend(format!("Tokenization failed: {}", e)))?;
            encodings.push(encoding);
        }

        let seq_len = encodings
            .iter()
            .map(|e| e.get_ids().len().min(MAX_SEQUENCE_LEN))
            .max()
            .unwrap_or(0)
            .max(1);
        let batch = encodings.len();
        let mut encoded = EncodedBatch {
            input_ids: vec![0; batch * seq_len],
            attention_mask: vec![0; batch * seq_len],
            token_type_ids: vec![0; batch * seq_len],
            batch,
            seq_len,
        };

        for (row, encoding) in encodings.iter().enumerate() {
            let tokens = encoding
                .get_ids()
                .iter()
                .zip(encoding.get_attention_mask())
                .zip(encoding.get_type_ids())
                .take(seq_len);
            for (col, ((&id, &mask), &type_id)) in tokens.enumerate() {
                let at = row * seq_len + col;
                encoded.input_ids[at] = id as i64;
                encoded.attention_mask[at] = mask as i64;
                encoded.token_type_ids[at] = type_id as i64;
            }
        }
        Ok(encoded)
    }

    /// Tokenize, run inference, and mean-pool the output of one batch.
    fn embed_sync(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ServiceError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let encoded = self.encode(texts)?;
        let shape = (encoded.batch, encoded.seq_len);

        let ids_array = ndarray::Array2::from_shape_vec(shape, encoded.input_ids)
            .map_err(|e| ServiceError::Backend(format!("input_ids array: {}", e)))?;
        let mask_array = ndarray::Array2::from_shape_vec(shape, encoded.attention_mask.clone())
            .map_err(|e| ServiceError::Backend(format!("attention_mask array: {}", e)))?;
        let type_array = ndarray::Array2::from_shape_vec(shape, encoded.token_type_ids)
            .map_err(|e| ServiceError::Backend(format!("token_type_ids array: {}", e)))?;

        let ids_ref = TensorRef::from_array_view(&ids_array)
            .map_err(|e| ServiceError::Backend(format!("TensorRef input_ids: {}", e)))?;
        let mask_ref = TensorRef::from_array_view(&mask_array)
            .map_err(|e| ServiceError::Backend(format!("TensorRef attention_mask: {}", e)))?;
        let type_ref = TensorRef::from_array_view(&type_array)
            .map_err(|e| ServiceError::Backend(format!("TensorRef token_type_ids: {}", e)))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| ServiceError::Backend(format!("Session lock poisoned: {}", e)))?;
        let outputs = session
            .run(ort::inputs![ids_ref, mask_ref, type_ref])
            .map_err(|e| ServiceError::Backend(format!("ONNX inference failed: {}", e)))?;

        // [batch, seq_len, hidden]
        let (out_shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| ServiceError::Backend(format!("Extract embeddings: {}", e)))?;
        let dims: Vec<i64> = out_shape.iter().copied().collect();
        let (out_seq, hidden) = match dims.as_slice() {
            [_, seq, hidden] if *seq > 0 && *hidden > 0 => (*seq as usize, *hidden as usize),
            other => {
                return Err(ServiceError::Backend(format!(
                    "Unexpected output shape: {:?}",
                    other
                )))
            }
        };
        if data.len() < encoded.batch * out_seq * hidden {
            return Err(ServiceError::Backend(format!(
                "output holds {} values, expected {}",
                data.len(),
                encoded.batch * out_seq * hidden
            )));
        }

        let mut vectors = Vec::with_capacity(encoded.batch);
        for row in 0..encoded.batch {
            let mut pooled = vec![0.0f32; hidden];
            let mut count = 0.0f32;
            for tok in 0..encoded.seq_len.min(out_seq) {
                if encoded.attention_mask[row * encoded.seq_len + tok] == 0 {
                    continue;
                }
                let offset = (row * out_seq + tok) * hidden;
                for (dim, value) in pooled.iter_mut().enumerate() {
                    *value += data[offset + dim];
                }
                count += 1.0;
            }
            if count > 0.0 {
                for value in &mut pooled {
                    *value /= count;
                }
            }
            normalize(&mut pooled);
            vectors.push(pooled);
        }
        Ok(vectors)
    }

    async fn embed_blocking(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, ServiceError> {
        // Inference is CPU-bound; keep it off the async workers.
        let service = self.clone();
        tokio::task::spawn_blocking(move || service.embed_sync(&texts))
            .await
            .map_err(|e| ServiceError::Backend(format!("Embedding task panicked: {}", e)))?
    }
}

impl EmbeddingService for OnnxEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ServiceError> {
        let mut vectors = self.embed_blocking(vec![text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| ServiceError::Backend("no embedding produced".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ServiceError> {
        self.embed_blocking(texts.to_vec()).await
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn max_batch_size(&self) -> usize {
        MAX_BATCH_SIZE
    }

    fn name(&self) -> &'static str {
        "onnx"
    }
}
