//! Prompts for retrieval-augmented answers.

use std::fmt::Write;

use super::index::RetrievedChunk;

/// System prompt for the answering deployment.
pub const RAG_SYSTEM_PROMPT: &str = "You are a helpful assistant for question-answering tasks \
based on retrieved chunks of documents. You receive a question and some chunks of documents \
that are relevant to this question. Your task is to provide a comprehensive and accurate answer \
to the question using the information from the retrieved chunks. Make sure to use the retrieved \
chunks effectively to construct your answer. If the information in the chunks is not sufficient \
to answer the question, do your best to provide a relevant and informative response based on the \
available data. Always try to give the most complete answer possible, and if you are unsure about \
something, make that clear in your response.";

/// Build the user prompt: the retrieved chunks, numbered from 1, then the
/// question.
pub fn augmented_prompt(request: &str, chunks: &[RetrievedChunk]) -> String {
    let mut prompt =
        String::from("Use the following retrieved chunks from the document to answer the question:\n\n");
    for (i, chunk) in chunks.iter().enumerate() {
        // Writing to a String cannot fail.
        let _ = write!(prompt, "Chunk {}:\n{}\n\n", i + 1, chunk.text);
    }
    let _ = write!(prompt, "Question: {request}\n\nAnswer:");
    prompt
}
