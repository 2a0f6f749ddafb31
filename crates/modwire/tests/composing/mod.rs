//! Entry-point composition against assembled trees.
