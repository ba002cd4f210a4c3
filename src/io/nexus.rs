use std::io::Write;

use crate::annotation::AnnotatedTree;
use crate::tree::NodeIdx;
use crate::Result;

const NEXUS_HEADER: &str = "#NEXUS";
const BLOCK_END: &str = "end;";
const TREE_NAME: &str = "tree_1";
const BLEN_PRECISION: usize = 7;

/// Writes the annotated tree as a NEXUS document: a taxa block with every
/// real name and its annotation, and a trees block with one rooted tree.
/// Tips are written as quoted real names, internal nodes as their
/// annotation only, every non-root node followed by its branch length.
pub fn write_nexus<W: Write + ?Sized>(annotated: &AnnotatedTree, out: &mut W) -> Result<()> {
    NexusWriter { annotated, out }
        .header()?
        .taxa_block()?
        .trees_block()?;
    Ok(())
}

struct NexusWriter<'a, W: Write + ?Sized> {
    annotated: &'a AnnotatedTree,
    out: &'a mut W,
}

impl<W: Write + ?Sized> NexusWriter<'_, W> {
    fn header(&mut self) -> Result<&mut Self> {
        writeln!(self.out, "{}", NEXUS_HEADER)?;
        Ok(self)
    }

    fn taxa_block(&mut self) -> Result<&mut Self> {
        let tree = self.annotated.tree();
        writeln!(self.out, "begin taxa;")?;
        writeln!(self.out, "\tdimensions ntax={};", tree.leaf_count())?;
        writeln!(self.out, "\ttaxlabels")?;
        for &leaf in tree.leaves() {
            writeln!(
                self.out,
                "\t\t{}{}",
                quote_label(self.annotated.real_name(leaf).unwrap_or_default()),
                self.annotated.annotation(leaf)
            )?;
        }
        writeln!(self.out, ";")?;
        writeln!(self.out, "{}", BLOCK_END)?;
        writeln!(self.out)?;
        Ok(self)
    }

    fn trees_block(&mut self) -> Result<&mut Self> {
        let mut newick = String::new();
        self.node_newick(self.annotated.tree().root, &mut newick);
        writeln!(self.out, "begin trees;")?;
        writeln!(self.out, "tree {} = [&R] {};", TREE_NAME, newick)?;
        writeln!(self.out, "{}", BLOCK_END)?;
        Ok(self)
    }

    fn node_newick(&self, idx: NodeIdx, newick: &mut String) {
        let tree = self.annotated.tree();
        match idx {
            NodeIdx::Internal(_) => {
                newick.push('(');
                for (i, child) in tree.children(idx).iter().enumerate() {
                    if i > 0 {
                        newick.push(',');
                    }
                    self.node_newick(*child, newick);
                }
                newick.push(')');
            }
            NodeIdx::Leaf(_) => {
                newick.push_str(&quote_label(
                    self.annotated.real_name(idx).unwrap_or_default(),
                ));
            }
        }
        if let Some(blen) = self.annotated.branch_length(idx) {
            newick.push_str(&self.annotated.annotation(idx).to_string());
            newick.push_str(&format!(":{:.*}", BLEN_PRECISION, blen));
        }
    }
}

/// Wraps a name in single quotes, doubling any quote inside it.
fn quote_label(label: &str) -> String {
    format!("'{}'", label.replace('\'', "''"))
}
